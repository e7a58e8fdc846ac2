use ndarray::prelude::*;

use crate::{MlErr, Result};

/// Collapses every dimension but the batch one.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flatten;

impl Flatten {
    pub fn new() -> Self {
        Self
    }

    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        match input.split_first() {
            Some((&n, rest)) if !rest.is_empty() => Ok(vec![n, rest.iter().product()]),
            _ => Err(MlErr::SizeMismatch {
                what: "flatten input dimensions",
                got: input.len(),
                expected: 2,
            }),
        }
    }

    pub fn forward(&self, x: ArrayViewD<f32>) -> Result<Array2<f32>> {
        let shape = self.output_shape(x.shape())?;
        let x = x.as_standard_layout().into_owned();
        Ok(x.into_shape_with_order((shape[0], shape[1]))?)
    }

    pub fn backward(&self, x: ArrayViewD<f32>, d: Array2<f32>) -> Result<ArrayD<f32>> {
        let d = d.as_standard_layout().into_owned();
        Ok(d.into_shape_with_order(x.shape())?)
    }
}
