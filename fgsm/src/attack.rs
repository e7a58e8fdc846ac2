use machine_learning::{Classifier, arch::Model};
use ndarray::{Array4, ArrayView4, Axis, Zip};

use crate::{FgsmErr, Result};

/// The Fast Gradient Sign Method attack.
///
/// Moves every pixel one `epsilon` step in the direction that increases the classifier's loss,
/// then clamps the result back into the valid `[0, 1]` pixel range.
#[derive(Clone, Copy, Debug)]
pub struct FgsmAttack {
    epsilon: f32,
}

impl FgsmAttack {
    /// Creates a new `FgsmAttack`.
    ///
    /// # Arguments
    /// * `epsilon` - The perturbation magnitude.
    ///
    /// # Returns
    /// An error if `epsilon` is negative, infinite or NaN.
    pub fn new(epsilon: f32) -> Result<Self> {
        if !epsilon.is_finite() || epsilon < 0. {
            return Err(FgsmErr::InvalidEpsilon(epsilon));
        }

        Ok(Self { epsilon })
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Generates adversarial versions of `images`.
    ///
    /// # Arguments
    /// * `classifier` - The attacked classifier.
    /// * `images` - A `(N, 1, 28, 28)` batch with values in `[0, 1]`.
    /// * `labels` - The label each image is pushed away from, one per image.
    ///
    /// # Returns
    /// The perturbed batch, with the same shape as `images`.
    pub fn generate<M: Model>(
        &self,
        classifier: &Classifier<M>,
        images: ArrayView4<f32>,
        labels: &[usize],
    ) -> Result<Array4<f32>> {
        let n = images.len_of(Axis(0));
        if labels.len() != n {
            return Err(FgsmErr::LabelCount {
                got: labels.len(),
                expected: n,
            });
        }

        let (_, grad) = classifier.loss_input_gradient(images, labels)?;
        Ok(self.perturb(images, grad.view()))
    }

    /// Applies `clamp(x + epsilon * sign(grad), 0, 1)` element wise.
    pub fn perturb(&self, images: ArrayView4<f32>, grad: ArrayView4<f32>) -> Array4<f32> {
        let mut adv = images.to_owned();
        Zip::from(&mut adv)
            .and(&grad)
            .for_each(|x, &g| *x = (*x + self.epsilon * sign(g)).clamp(0., 1.));

        adv
    }
}

/// The sign of `x`, `0` for both zeros and NaN.
///
/// `f32::signum` maps `+0.0` to `1.0`, which would perturb pixels the loss doesn't depend on.
pub fn sign(x: f32) -> f32 {
    if x > 0. {
        1.
    } else if x < 0. {
        -1.
    } else {
        0.
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, array};

    use super::*;

    #[test]
    fn sign_of_zero_and_nan_is_zero() {
        assert_eq!(sign(3.5), 1.);
        assert_eq!(sign(-1e-30), -1.);
        assert_eq!(sign(0.), 0.);
        assert_eq!(sign(-0.), 0.);
        assert_eq!(sign(f32::NAN), 0.);
    }

    #[test]
    fn rejects_bad_epsilons() {
        for epsilon in [-0.1, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                FgsmAttack::new(epsilon),
                Err(FgsmErr::InvalidEpsilon(_))
            ));
        }

        assert!(FgsmAttack::new(0.).is_ok());
    }

    #[test]
    fn perturb_steps_and_clamps() {
        let attack = FgsmAttack::new(0.25).unwrap();
        let images = array![[[[0.5, 0.9], [0.1, 0.5]]]];
        let grad = array![[[[1., 2.], [-3., 0.]]]];

        let adv = attack.perturb(images.view(), grad.view());

        assert_eq!(adv, array![[[[0.75, 1.], [0., 0.5]]]]);
    }

    #[test]
    fn perturb_with_zero_epsilon_is_identity() {
        let attack = FgsmAttack::new(0.).unwrap();
        let images = Array::linspace(0., 1., 16).into_shape_with_order((1, 1, 4, 4)).unwrap();
        let grad = images.mapv(|x| x - 0.5);

        assert_eq!(attack.perturb(images.view(), grad.view()), images);
    }
}
