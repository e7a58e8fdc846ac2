use std::path::Path;

use ndarray::{Array2, Array4, ArrayView1, ArrayView4, Axis, Ix2, Ix4};

use crate::{
    MlErr, Result,
    arch::{Model, Sequential, loss::CrossEntropy},
    checkpoint,
};

/// A trained classifier: a model together with its parameters. It's immutable once built so it
/// can be shared freely between threads.
#[derive(Clone, Debug)]
pub struct Classifier<M: Model = Sequential> {
    model: M,
    params: Vec<f32>,
}

impl<M: Model> Classifier<M> {
    /// Creates a new `Classifier`.
    ///
    /// # Returns
    /// An error if `params` doesn't have exactly `model.size()` elements.
    pub fn new(model: M, params: Vec<f32>) -> Result<Self> {
        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "classifier parameters",
                got: params.len(),
                expected: model.size(),
            });
        }

        Ok(Self { model, params })
    }

    /// Builds a classifier with the parameters stored in the checkpoint at `path`.
    pub fn from_checkpoint(path: &Path, model: M) -> Result<Self> {
        let params = checkpoint::load(path, &model)?;
        Self::new(model, params)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        checkpoint::save(path, &self.model, &self.params)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Returns the raw class scores, one row per image.
    pub fn logits(&self, images: ArrayView4<f32>) -> Result<Array2<f32>> {
        let y = self.model.forward(&self.params, images.into_dyn())?;
        Ok(y.into_dimensionality::<Ix2>()?)
    }

    /// Returns the predicted class of every image.
    pub fn predict(&self, images: ArrayView4<f32>) -> Result<Vec<usize>> {
        let logits = self.logits(images)?;
        Ok(logits.axis_iter(Axis(0)).map(argmax).collect())
    }

    /// Computes the cross entropy loss of the batch and its gradient with respect to the input
    /// pixels. The parameters are left untouched.
    pub fn loss_input_gradient(
        &self,
        images: ArrayView4<f32>,
        labels: &[usize],
    ) -> Result<(f32, Array4<f32>)> {
        let (loss, dx) =
            self.model
                .backprop(&self.params, images.into_dyn(), labels, &CrossEntropy, None)?;

        Ok((loss, dx.into_dimensionality::<Ix4>()?))
    }
}

/// Returns the index of the largest element, the first one on ties. NaNs never win.
pub fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::layers::Layer;

    // Two classes scored by the brightness of the top and bottom rows of a 2x2 image.
    fn classifier() -> Classifier {
        let model = Sequential::new([Layer::flatten(), Layer::dense((4, 2), None)]);
        let params = vec![
            1., 0., //
            1., 0., //
            0., 1., //
            0., 1., //
            0., 0.,
        ];
        Classifier::new(model, params).unwrap()
    }

    #[test]
    fn predicts_the_highest_logit() {
        let images = array![[[[1., 1.], [0., 0.]]], [[[0., 0.], [1., 0.]]]];

        assert_eq!(classifier().predict(images.view()).unwrap(), [0, 1]);
    }

    #[test]
    fn input_gradient_points_away_from_the_label() {
        let images = array![[[[1., 1.], [0., 0.]]]];

        let (loss, dx) = classifier()
            .loss_input_gradient(images.view(), &[0])
            .unwrap();

        assert!(loss > 0.);
        assert_eq!(dx.dim(), (1, 1, 2, 2));
        // brightening the top row helps class 0, brightening the bottom row hurts it.
        assert!(dx[[0, 0, 0, 0]] < 0. && dx[[0, 0, 0, 1]] < 0.);
        assert!(dx[[0, 0, 1, 0]] > 0. && dx[[0, 0, 1, 1]] > 0.);
    }

    #[test]
    fn argmax_prefers_the_first_maximum_and_skips_nans() {
        assert_eq!(argmax(array![1., 3., 3.].view()), 1);
        assert_eq!(argmax(array![f32::NAN, -1.].view()), 1);
    }

    #[test]
    fn rejects_wrong_param_count() {
        let model = Sequential::new([Layer::flatten(), Layer::dense((4, 2), None)]);

        assert!(Classifier::new(model, vec![0.; 3]).is_err());
    }
}
