mod conv2d;
mod dense;
mod flatten;
mod layer;
mod max_pool;

pub use conv2d::Conv2d;
pub use dense::Dense;
pub use flatten::Flatten;
pub use layer::Layer;
pub use max_pool::MaxPool2d;
