pub mod activations;
pub mod layers;
pub mod loss;
mod model;
mod sequential;

pub use model::{Model, ParamShape};
pub use sequential::Sequential;
