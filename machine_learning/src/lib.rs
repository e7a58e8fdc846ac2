pub mod arch;
pub mod checkpoint;
mod classifier;
pub mod dataset;
mod error;
pub mod initialization;
pub mod optimization;
pub mod training;

pub use classifier::{Classifier, argmax};
pub use error::{MlErr, Result};
