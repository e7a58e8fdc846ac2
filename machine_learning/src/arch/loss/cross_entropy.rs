use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// Softmax cross entropy computed directly from the logits, averaged over the batch.
#[derive(Default, Clone, Copy, Debug)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Row wise softmax, shifted by the row maximum so it never overflows.
    pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
        let mut p = logits.to_owned();

        for mut row in p.rows_mut() {
            let max = row.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
            row.mapv_inplace(|z| (z - max).exp());
            let sum = row.sum();
            row /= sum;
        }

        p
    }

    fn check(y_pred: ArrayView2<f32>, labels: &[usize]) -> Result<()> {
        if y_pred.nrows() == 0 {
            return Err(MlErr::EmptyBatch);
        }

        if y_pred.nrows() != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "labels",
                got: labels.len(),
                expected: y_pred.nrows(),
            });
        }

        let classes = y_pred.ncols();
        match labels.iter().find(|&&label| label >= classes) {
            Some(&label) => Err(MlErr::LabelOutOfRange { label, classes }),
            None => Ok(()),
        }
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, labels: &[usize]) -> Result<f32> {
        Self::check(y_pred, labels)?;

        let total: f32 = y_pred
            .axis_iter(Axis(0))
            .zip(labels)
            .map(|(row, &label)| {
                let max = row.fold(f32::NEG_INFINITY, |m, &z| m.max(z));
                let log_sum_exp = max + row.mapv(|z| (z - max).exp()).sum().ln();
                log_sum_exp - row[label]
            })
            .sum();

        Ok(total / labels.len() as f32)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, labels: &[usize]) -> Result<Array2<f32>> {
        Self::check(y_pred, labels)?;

        let mut d = Self::softmax(y_pred);
        for (mut row, &label) in d.axis_iter_mut(Axis(0)).zip(labels) {
            row[label] -= 1.;
        }

        d /= labels.len() as f32;
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_logits_cost_ln_of_the_classes() {
        let logits = array![[0., 0., 0., 0.], [3., 3., 3., 3.]];

        let loss = CrossEntropy.loss(logits.view(), &[0, 3]).unwrap();

        assert!((loss - 4f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn huge_logits_dont_overflow() {
        let logits = array![[1000., 0.]];

        let loss = CrossEntropy.loss(logits.view(), &[0]).unwrap();
        let d = CrossEntropy.loss_prime(logits.view(), &[1]).unwrap();

        assert!(loss.abs() < 1e-6);
        assert!((d[[0, 0]] - 1.).abs() < 1e-6);
        assert!((d[[0, 1]] + 1.).abs() < 1e-6);
    }

    #[test]
    fn gradient_rows_sum_to_zero_and_are_averaged() {
        let logits = array![[1., 2., 3.], [0.5, -1., 2.]];

        let d = CrossEntropy.loss_prime(logits.view(), &[2, 0]).unwrap();

        for row in d.rows() {
            assert!(row.sum().abs() < 1e-6);
        }
        let p = CrossEntropy::softmax(logits.view());
        assert!((d[[0, 2]] - (p[[0, 2]] - 1.) / 2.).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_labels() {
        let logits = array![[1., 2.]];

        assert!(matches!(
            CrossEntropy.loss(logits.view(), &[2]),
            Err(MlErr::LabelOutOfRange {
                label: 2,
                classes: 2
            })
        ));
        assert!(matches!(
            CrossEntropy.loss(logits.view(), &[0, 1]),
            Err(MlErr::SizeMismatch { what: "labels", .. })
        ));
    }
}
