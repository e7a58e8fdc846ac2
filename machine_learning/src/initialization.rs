use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result, arch::Sequential};

/// A parameter generator that samples a layer's parameters from `U(-b, b)` with
/// `b = 1 / sqrt(fan_in)`, the Kaiming uniform bound for ReLU networks.
pub struct ParamGen<'r, R: Rng> {
    rng: &'r mut R,
}

impl<'r, R: Rng> ParamGen<'r, R> {
    /// Creates a new `ParamGen`.
    ///
    /// # Arguments
    /// * `rng` - The random number generator the parameters are drawn from.
    pub fn new(rng: &'r mut R) -> Self {
        Self { rng }
    }

    /// Samples `n` parameters for a layer with `fan_in` inputs per unit.
    ///
    /// # Returns
    /// An error if the bound can't make a valid uniform distribution (i.e. `fan_in` is zero).
    pub fn sample(&mut self, n: usize, fan_in: usize) -> Result<Vec<f32>> {
        let bound = 1. / (fan_in as f32).sqrt();
        let distribution =
            Uniform::new_inclusive(-bound, bound).map_err(|e| MlErr::Init(e.to_string()))?;

        Ok(distribution.sample_iter(&mut *self.rng).take(n).collect())
    }

    /// Generates the full parameter vector of a model.
    pub fn init(&mut self, model: &Sequential) -> Result<Vec<f32>> {
        let mut params = Vec::new();

        for layer in model.layers() {
            if let Some(fan_in) = layer.fan_in() {
                params.extend(self.sample(layer.size(), fan_in)?);
            }
        }

        Ok(params)
    }
}

/// Initializes the parameters of `model` with a `ParamGen` over `rng`.
pub fn init_params<R: Rng>(model: &Sequential, rng: &mut R) -> Result<Vec<f32>> {
    ParamGen::new(rng).init(model)
}
