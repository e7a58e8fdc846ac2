use ndarray::{Zip, linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A 2D convolution (cross-correlation) with square kernels, stride 1 and no padding, working on
/// `(batch, channels, height, width)` tensors.
///
/// The parameter slice holds the `(out, in, k, k)` kernels in row major order followed by the
/// `out` biases. Both passes lower each sample to a patch matrix (*im2col*) so the heavy lifting
/// is a single matrix product.
#[derive(Clone, Debug)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    act_fn: Option<ActFn>,
}

impl Conv2d {
    /// Creates a new `Conv2d` layer.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of channels of the input.
    /// * `out_channels` - The amount of kernels, i.e. channels of the output.
    /// * `kernel` - The side of the square kernels.
    /// * `act_fn` - An optional activation applied to the output.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        act_fn: Option<ActFn>,
    ) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel,
            act_fn,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.out_channels * self.patch_len() + self.out_channels
    }

    /// The amount of inputs every output unit sees.
    pub fn patch_len(&self) -> usize {
        self.in_channels * self.kernel * self.kernel
    }

    pub fn param_shapes(&self) -> [Vec<usize>; 2] {
        let (o, i, k) = (self.out_channels, self.in_channels, self.kernel);
        [vec![o, i, k, k], vec![o]]
    }

    /// Returns the `(channels, height, width)` of the output for an input of the given spatial
    /// dimensions.
    pub fn output_dim(&self, channels: usize, h: usize, w: usize) -> Result<(usize, usize, usize)> {
        if channels != self.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv2d input channels",
                got: channels,
                expected: self.in_channels,
            });
        }

        let k = self.kernel;
        if h < k || w < k {
            return Err(MlErr::SizeMismatch {
                what: "conv2d input side",
                got: h.min(w),
                expected: k,
            });
        }

        Ok((self.out_channels, h - k + 1, w - k + 1))
    }

    pub fn forward(&self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (o, oh, ow) = self.output_dim(c, h, w)?;
        let (weights, biases) = self.view_params(params)?;

        let mut z = Array3::zeros((n, o, oh * ow));
        Zip::from(z.outer_iter_mut())
            .and(x.outer_iter())
            .par_for_each(|mut z, x| {
                let cols = self.im2col(x, oh, ow);
                linalg::general_mat_mul(1.0, &weights, &cols, 0.0, &mut z);
            });

        z += &biases.insert_axis(Axis(1));

        if let Some(act_fn) = self.act_fn {
            z.par_mapv_inplace(|z| act_fn.f(z));
        }

        Ok(z.into_shape_with_order((n, o, oh, ow))?)
    }

    /// Propagates `d`, the gradient of the loss with respect to this layer's output `y`, back
    /// to the layer's input `x`. When `grad` is given the parameter gradient is accumulated into
    /// it.
    pub fn backward(
        &self,
        params: &[f32],
        x: ArrayView4<f32>,
        y: ArrayView4<f32>,
        mut d: Array4<f32>,
        grad: Option<&mut [f32]>,
    ) -> Result<Array4<f32>> {
        if d.dim() != y.dim() {
            return Err(MlErr::SizeMismatch {
                what: "conv2d output gradient",
                got: d.len(),
                expected: y.len(),
            });
        }

        if let Some(act_fn) = self.act_fn {
            d.zip_mut_with(&y, |d, &a| *d *= act_fn.df(a));
        }

        let (n, c, h, w) = x.dim();
        let (o, oh, ow) = self.output_dim(c, h, w)?;
        let (weights, _) = self.view_params(params)?;
        let mut grads = grad.map(|grad| self.view_grad(grad)).transpose()?;

        let mut dx = Array4::zeros((n, c, h, w));
        for ((xs, ds), dxs) in x.outer_iter().zip(d.outer_iter()).zip(dx.outer_iter_mut()) {
            let cols = self.im2col(xs, oh, ow);
            let ds = ds.to_shape((o, oh * ow))?;

            if let Some((dw, db)) = grads.as_mut() {
                linalg::general_mat_mul(1.0, &ds, &cols.t(), 1.0, dw);
                *db += &ds.sum_axis(Axis(1));
            }

            let dcols = weights.t().dot(&ds);
            self.col2im(dcols.view(), dxs, oh, ow)?;
        }

        Ok(dx)
    }

    /// Lays out every `k x k` window of `x` as a column, one row per `(channel, ky, kx)` offset.
    fn im2col(&self, x: ArrayView3<f32>, oh: usize, ow: usize) -> Array2<f32> {
        let k = self.kernel;
        let mut cols = Array2::zeros((self.patch_len(), oh * ow));

        for (row, mut col) in cols.outer_iter_mut().enumerate() {
            let (c, ky, kx) = (row / (k * k), (row / k) % k, row % k);
            let window = x.slice(s![c, ky..ky + oh, kx..kx + ow]);
            col.iter_mut()
                .zip(window.iter())
                .for_each(|(dst, &src)| *dst = src);
        }

        cols
    }

    /// The adjoint of `im2col`: scatters (adding) every patch row back onto the image.
    fn col2im(
        &self,
        cols: ArrayView2<f32>,
        mut dx: ArrayViewMut3<f32>,
        oh: usize,
        ow: usize,
    ) -> Result<()> {
        let k = self.kernel;

        for (row, col) in cols.outer_iter().enumerate() {
            let (c, ky, kx) = (row / (k * k), (row / k) % k, row % k);
            let col = col.to_shape((oh, ow))?;
            let mut window = dx.slice_mut(s![c, ky..ky + oh, kx..kx + ow]);
            window += &col;
        }

        Ok(())
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("conv2d parameters", params.len())?;

        let w_size = self.size() - self.out_channels;
        let weights =
            ArrayView2::from_shape((self.out_channels, self.patch_len()), &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.out_channels, &params[w_size..])?;
        Ok((weights, biases))
    }

    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("conv2d gradient", grad.len())?;

        let w_size = self.size() - self.out_channels;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape((self.out_channels, self.patch_len()), dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.out_channels, db_raw)?;
        Ok((dw, db))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, c: usize, h: usize, w: usize) -> Array4<f32> {
        Array4::from_shape_fn((n, c, h, w), |(n, c, i, j)| {
            (n * 7 + c * 5 + i * 3 + j) as f32 * 0.1
        })
    }

    /// The textbook definition, used as a reference for the im2col implementation.
    fn naive_forward(conv: &Conv2d, params: &[f32], x: ArrayView4<f32>) -> Array4<f32> {
        let (n, c, h, w) = x.dim();
        let (o, oh, ow) = conv.output_dim(c, h, w).unwrap();
        let k = conv.kernel;
        let (weights, biases) = conv.view_params(params).unwrap();
        let weights = weights.to_shape((o, c, k, k)).unwrap();

        Array4::from_shape_fn((n, o, oh, ow), |(n, o, i, j)| {
            let mut acc = biases[o];
            for c in 0..c {
                for ky in 0..k {
                    for kx in 0..k {
                        acc += weights[[o, c, ky, kx]] * x[[n, c, i + ky, j + kx]];
                    }
                }
            }
            acc
        })
    }

    #[test]
    fn forward_matches_naive_convolution() {
        let conv = Conv2d::new(2, 3, 3, None);
        let params: Vec<f32> = (0..conv.size())
            .map(|i| ((i * 37) % 11) as f32 * 0.05 - 0.25)
            .collect();
        let x = ramp(2, 2, 6, 5);

        let y = conv.forward(&params, x.view()).unwrap();
        let expected = naive_forward(&conv, &params, x.view());

        assert_eq!(y.dim(), (2, 3, 4, 3));
        y.iter()
            .zip(expected.iter())
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-5, "{a} != {b}"));
    }

    #[test]
    fn backward_of_box_filter_counts_window_overlaps() {
        // a single all ones kernel: dL/dx is the amount of windows covering each pixel.
        let conv = Conv2d::new(1, 1, 2, None);
        let params = [1., 1., 1., 1., 0.];
        let x = Array4::zeros((1, 1, 3, 3));
        let y = conv.forward(&params, x.view()).unwrap();

        let mut grad = vec![0.; conv.size()];
        let dx = conv
            .backward(&params, x.view(), y.view(), Array4::ones(y.raw_dim()), Some(&mut grad))
            .unwrap();

        let expected = array![[1., 2., 1.], [2., 4., 2.], [1., 2., 1.]];
        assert_eq!(dx.slice(s![0, 0, .., ..]), expected);
        // x is all zeros so the kernel gradient is too, the bias sees the 4 output units.
        assert_eq!(grad, vec![0., 0., 0., 0., 4.]);
    }

    #[test]
    fn rejects_wrong_channel_count() {
        let conv = Conv2d::new(3, 1, 3, None);
        let params = vec![0.; conv.size()];
        let x = Array4::zeros((1, 1, 5, 5));

        assert!(matches!(
            conv.forward(&params, x.view()),
            Err(MlErr::SizeMismatch {
                what: "conv2d input channels",
                ..
            })
        ));
    }
}
