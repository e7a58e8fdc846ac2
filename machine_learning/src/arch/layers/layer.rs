use ndarray::{ArrayD, ArrayViewD, Ix2, Ix4};

use super::{Conv2d, Dense, Flatten, MaxPool2d};
use crate::{MlErr, Result, arch::activations::ActFn};

/// Every kind of layer a `Sequential` model can hold.
#[derive(Clone, Debug)]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Flatten(Flatten),
    Dense(Dense),
}

impl Layer {
    pub fn conv2d(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self::Conv2d(Conv2d::new(in_channels, out_channels, kernel, act_fn))
    }

    pub fn max_pool2d(size: usize) -> Self {
        Self::MaxPool2d(MaxPool2d::new(size))
    }

    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    /// Returns the amount of parameters of this layer.
    pub fn size(&self) -> usize {
        match self {
            Layer::Conv2d(l) => l.size(),
            Layer::Dense(l) => l.size(),
            Layer::MaxPool2d(_) | Layer::Flatten(_) => 0,
        }
    }

    /// The amount of inputs feeding each output unit, used to scale the initial parameters.
    pub fn fan_in(&self) -> Option<usize> {
        match self {
            Layer::Conv2d(l) => Some(l.patch_len()),
            Layer::Dense(l) => Some(l.dim().0),
            Layer::MaxPool2d(_) | Layer::Flatten(_) => None,
        }
    }

    /// Returns the named shapes of the parameter tensors, in the order they are laid out in the
    /// parameter slice.
    pub fn param_shapes(&self) -> Vec<(&'static str, Vec<usize>)> {
        let [weight, bias] = match self {
            Layer::Conv2d(l) => l.param_shapes(),
            Layer::Dense(l) => l.param_shapes(),
            Layer::MaxPool2d(_) | Layer::Flatten(_) => return Vec::new(),
        };

        vec![("weight", weight), ("bias", bias)]
    }

    /// Returns the shape of the output produced for an input of shape `input`.
    pub fn output_shape(&self, input: &[usize]) -> Result<Vec<usize>> {
        match (self, input) {
            (Layer::Conv2d(l), &[n, c, h, w]) => {
                let (o, oh, ow) = l.output_dim(c, h, w)?;
                Ok(vec![n, o, oh, ow])
            }
            (Layer::MaxPool2d(l), &[n, c, h, w]) => {
                let (oh, ow) = l.output_dim(h, w)?;
                Ok(vec![n, c, oh, ow])
            }
            (Layer::Flatten(l), input) => l.output_shape(input),
            (Layer::Dense(l), &[n, features]) => {
                let (fan_in, fan_out) = l.dim();
                if features != fan_in {
                    return Err(MlErr::SizeMismatch {
                        what: "dense input features",
                        got: features,
                        expected: fan_in,
                    });
                }

                Ok(vec![n, fan_out])
            }
            (Layer::Dense(_), input) => Err(Self::rank_mismatch(input.len(), 2)),
            (_, input) => Err(Self::rank_mismatch(input.len(), 4)),
        }
    }

    pub fn forward(&self, params: &[f32], x: ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        let y = match self {
            Layer::Conv2d(l) => l.forward(params, x.into_dimensionality::<Ix4>()?)?.into_dyn(),
            Layer::MaxPool2d(l) => l.forward(x.into_dimensionality::<Ix4>()?)?.into_dyn(),
            Layer::Flatten(l) => l.forward(x)?.into_dyn(),
            Layer::Dense(l) => l.forward(params, x.into_dimensionality::<Ix2>()?)?.into_dyn(),
        };

        Ok(y)
    }

    /// Computes the gradient with respect to this layer's input.
    ///
    /// # Arguments
    /// * `params` - This layer's parameters.
    /// * `x` - The input this layer received on the forward pass.
    /// * `y` - The output this layer produced on the forward pass.
    /// * `d` - The gradient of the loss with respect to `y`.
    /// * `grad` - Where to accumulate the parameter gradient, if wanted.
    pub fn backward(
        &self,
        params: &[f32],
        x: ArrayViewD<f32>,
        y: ArrayViewD<f32>,
        d: ArrayD<f32>,
        grad: Option<&mut [f32]>,
    ) -> Result<ArrayD<f32>> {
        let dx = match self {
            Layer::Conv2d(l) => l
                .backward(
                    params,
                    x.into_dimensionality()?,
                    y.into_dimensionality()?,
                    d.into_dimensionality()?,
                    grad,
                )?
                .into_dyn(),
            Layer::MaxPool2d(l) => l
                .backward(x.into_dimensionality()?, d.view().into_dimensionality()?)?
                .into_dyn(),
            Layer::Flatten(l) => l.backward(x, d.into_dimensionality()?)?,
            Layer::Dense(l) => l
                .backward(
                    params,
                    x.into_dimensionality()?,
                    y.into_dimensionality()?,
                    d.into_dimensionality()?,
                    grad,
                )?
                .into_dyn(),
        };

        Ok(dx)
    }

    fn rank_mismatch(got: usize, expected: usize) -> MlErr {
        MlErr::SizeMismatch {
            what: "layer input dimensions",
            got,
            expected,
        }
    }
}
