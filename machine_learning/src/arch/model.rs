use ndarray::{ArrayD, ArrayViewD};

use super::loss::LossFn;
use crate::Result;

/// A named parameter tensor, as stored in checkpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamShape {
    pub name: String,
    pub shape: Vec<usize>,
}

impl ParamShape {
    /// Returns the amount of scalars in the tensor.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A differentiable model. Models don't own their parameters, those are always handed in as a
/// flat slice of `size()` elements.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Returns the parameter tensors of the model, in the order they appear in the flat slice.
    fn param_shapes(&self) -> Vec<ParamShape>;

    /// Computes the model's output for a batch.
    fn forward(&self, params: &[f32], x: ArrayViewD<f32>) -> Result<ArrayD<f32>>;

    /// Runs a forward and a backward pass over a labeled batch.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch.
    /// * `labels` - One label per sample.
    /// * `loss_fn` - The loss function.
    /// * `grad` - A buffer of `size()` elements to write the parameter gradient to, if wanted.
    ///
    /// # Returns
    /// The batch loss and the gradient of the loss with respect to `x`.
    fn backprop<L: LossFn>(
        &self,
        params: &[f32],
        x: ArrayViewD<f32>,
        labels: &[usize],
        loss_fn: &L,
        grad: Option<&mut [f32]>,
    ) -> Result<(f32, ArrayD<f32>)>;
}
