use ndarray::{ArrayD, ArrayViewD, Ix2};

use super::{Model, ParamShape, layers::Layer, loss::LossFn};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the shape of the output for an input of shape `input`, or an error if the layers
    /// can't be chained for that input.
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        self.layers
            .iter()
            .try_fold(input.to_vec(), |shape, layer| layer.output_shape(&shape))
    }

    /// Makes a forward pass through the network keeping every intermediate activation.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `x` - The input batch.
    ///
    /// # Returns
    /// The trace of activations: the first element is `x` itself and the i+1-th is the output
    /// of the i-th layer, so the last one is the model's output.
    pub fn forward_trace(&self, params: &[f32], x: ArrayViewD<f32>) -> Result<Vec<ArrayD<f32>>> {
        Self::check_batch(&x)?;
        let slices = self.split_params(params)?;

        let mut trace = Vec::with_capacity(self.layers.len() + 1);
        trace.push(x.to_owned());

        for (layer, params) in self.layers.iter().zip(slices) {
            let x = trace[trace.len() - 1].view();
            let y = layer.forward(params, x)?;
            trace.push(y);
        }

        Ok(trace)
    }

    /// Makes a backward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `trace` - The activations recorded by `forward_trace`.
    /// * `d` - The gradient of the loss with respect to the model's output.
    /// * `grad` - A buffer of `size()` elements to write the parameter gradient to, if wanted.
    ///
    /// # Returns
    /// The gradient of the loss with respect to the model's input.
    pub fn backward(
        &self,
        params: &[f32],
        trace: &[ArrayD<f32>],
        mut d: ArrayD<f32>,
        mut grad: Option<&mut [f32]>,
    ) -> Result<ArrayD<f32>> {
        let nlayers = self.layers.len();
        if trace.len() != nlayers + 1 {
            return Err(MlErr::SizeMismatch {
                what: "activation trace",
                got: trace.len(),
                expected: nlayers + 1,
            });
        }

        let slices = self.split_params(params)?;
        let offsets = self.offsets();

        if let Some(grad) = grad.as_deref_mut() {
            if grad.len() != self.size() {
                return Err(MlErr::SizeMismatch {
                    what: "gradient",
                    got: grad.len(),
                    expected: self.size(),
                });
            }

            grad.fill(0.);
        }

        for (i, layer) in self.layers.iter().enumerate().rev() {
            // peel this layer's slice off the back of what's left of the buffer.
            let layer_grad = match grad.take() {
                Some(rest) => {
                    let (rest, own) = rest.split_at_mut(offsets[i]);
                    grad = Some(rest);
                    Some(own)
                }
                None => None,
            };

            d = layer.backward(slices[i], trace[i].view(), trace[i + 1].view(), d, layer_grad)?;
        }

        Ok(d)
    }

    fn check_batch(x: &ArrayViewD<f32>) -> Result<()> {
        match x.shape().first() {
            Some(&n) if n > 0 => Ok(()),
            _ => Err(MlErr::EmptyBatch),
        }
    }

    fn offsets(&self) -> Vec<usize> {
        self.layers
            .iter()
            .scan(0, |offset, layer| {
                let start = *offset;
                *offset += layer.size();
                Some(start)
            })
            .collect()
    }

    fn split_params<'p>(&self, params: &'p [f32]) -> Result<Vec<&'p [f32]>> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        let mut rest = params;
        let slices = self
            .layers
            .iter()
            .map(|layer| {
                let (own, tail) = rest.split_at(layer.size());
                rest = tail;
                own
            })
            .collect();

        Ok(slices)
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn param_shapes(&self) -> Vec<ParamShape> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer
                    .param_shapes()
                    .into_iter()
                    .map(move |(suffix, shape)| ParamShape {
                        name: format!("layers.{i}.{suffix}"),
                        shape,
                    })
            })
            .collect()
    }

    fn forward(&self, params: &[f32], x: ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        Self::check_batch(&x)?;
        let slices = self.split_params(params)?;

        let mut y = x.to_owned();
        for (layer, params) in self.layers.iter().zip(slices) {
            y = layer.forward(params, y.view())?;
        }

        Ok(y)
    }

    fn backprop<L: LossFn>(
        &self,
        params: &[f32],
        x: ArrayViewD<f32>,
        labels: &[usize],
        loss_fn: &L,
        grad: Option<&mut [f32]>,
    ) -> Result<(f32, ArrayD<f32>)> {
        let trace = self.forward_trace(params, x)?;
        let y_pred = trace[trace.len() - 1].view().into_dimensionality::<Ix2>()?;

        let loss = loss_fn.loss(y_pred, labels)?;
        let d = loss_fn.loss_prime(y_pred, labels)?.into_dyn();
        let dx = self.backward(params, &trace, d, grad)?;

        Ok((loss, dx))
    }
}
