pub mod attack;
pub mod config;
mod error;
pub mod evaluation;
pub mod model;

pub use attack::FgsmAttack;
pub use error::{FgsmErr, Result};
