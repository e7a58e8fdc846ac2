use std::num::NonZeroUsize;

use log::{debug, info};
use rand::Rng;

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// A model `Trainer`. Contains the relevant components needed for training a model, including
/// the model itself.
pub struct Trainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: M,
    optimizer: O,
    loss_fn: L,

    batch_size: NonZeroUsize,
    epochs: NonZeroUsize,
    log_every: usize,
    rng: R,
}

impl<M, O, L, R> Trainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `Trainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `optimizer` - Dictates how to update the parameters after each batch.
    /// * `loss_fn` - Measures the difference between a model's output and the expected one.
    /// * `batch_size` - The maximum amount of samples per optimization step.
    /// * `epochs` - The amount of full passes over the dataset.
    /// * `rng` - A random number generator, used for shuffling.
    pub fn new(
        model: M,
        optimizer: O,
        loss_fn: L,
        batch_size: NonZeroUsize,
        epochs: NonZeroUsize,
        rng: R,
    ) -> Self {
        Self {
            model,
            optimizer,
            loss_fn,
            batch_size,
            epochs,
            log_every: 100,
            rng,
        }
    }

    /// Sets how many batches go by between progress logs, 0 disables them.
    pub fn with_log_every(mut self, log_every: usize) -> Self {
        self.log_every = log_every;
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Trains the model over `dataset`, **`params` gets updated** after every batch.
    ///
    /// # Returns
    /// The mean batch loss of each epoch.
    pub fn train(&mut self, params: &mut [f32], dataset: &mut Dataset) -> Result<Vec<f32>> {
        let mut grad = vec![0.; self.model.size()];
        let mut losses = Vec::with_capacity(self.epochs.get());

        for epoch in 0..self.epochs.get() {
            dataset.shuffle(&mut self.rng);

            let mut total_loss = 0.;
            let mut num_batches = 0;

            for (x, labels) in dataset.batches(self.batch_size) {
                let (loss, _) = self.model.backprop(
                    params,
                    x.view().into_dyn(),
                    &labels,
                    &self.loss_fn,
                    Some(&mut grad),
                )?;
                self.optimizer.update_params(params, &grad)?;

                total_loss += loss;
                num_batches += 1;

                if self.log_every > 0 && num_batches % self.log_every == 0 {
                    debug!(epoch = epoch, batch = num_batches; "loss {loss:.4}");
                }
            }

            if num_batches == 0 {
                return Err(MlErr::EmptyBatch);
            }

            let epoch_loss = total_loss / num_batches as f32;
            info!("epoch {epoch} done: mean loss {epoch_loss:.4} over {num_batches} batches");
            losses.push(epoch_loss);
        }

        Ok(losses)
    }
}
