use ndarray::{Array2, ArrayView2};

use crate::Result;

/// A classification loss over a batch of predictions, one row per sample, and its integer
/// labels.
pub trait LossFn {
    /// Returns the mean loss of the batch.
    fn loss(&self, y_pred: ArrayView2<f32>, labels: &[usize]) -> Result<f32>;

    /// Returns the gradient of `loss` with respect to `y_pred`.
    fn loss_prime(&self, y_pred: ArrayView2<f32>, labels: &[usize]) -> Result<Array2<f32>>;
}
