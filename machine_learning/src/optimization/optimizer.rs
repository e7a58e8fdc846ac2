use crate::Result;

/// An optimization algorithm, takes a step over the parameters given their gradient.
pub trait Optimizer {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;
}
