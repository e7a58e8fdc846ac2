use ndarray::prelude::*;

use crate::{MlErr, Result};

/// Non overlapping max pooling over square windows. Trailing rows and columns that don't fill a
/// window are dropped.
#[derive(Clone, Copy, Debug)]
pub struct MaxPool2d {
    size: usize,
}

impl MaxPool2d {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn output_dim(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let p = self.size;
        if p == 0 || h < p || w < p {
            return Err(MlErr::SizeMismatch {
                what: "max pool input side",
                got: h.min(w),
                expected: p.max(1),
            });
        }

        Ok((h / p, w / p))
    }

    pub fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (oh, ow) = self.output_dim(h, w)?;
        let p = self.size;

        Ok(Array4::from_shape_fn((n, c, oh, ow), |(n, c, i, j)| {
            x.slice(s![n, c, i * p..(i + 1) * p, j * p..(j + 1) * p])
                .fold(f32::NEG_INFINITY, |m, &v| m.max(v))
        }))
    }

    /// Routes every output gradient to the input that won its window. On ties the first element
    /// in row major order wins.
    pub fn backward(&self, x: ArrayView4<f32>, d: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        let (oh, ow) = self.output_dim(h, w)?;
        if d.dim() != (n, c, oh, ow) {
            return Err(MlErr::SizeMismatch {
                what: "max pool output gradient",
                got: d.len(),
                expected: n * c * oh * ow,
            });
        }

        let mut dx = Array4::zeros(x.raw_dim());
        for ((n, c, i, j), &g) in d.indexed_iter() {
            let (a, b) = self.argmax(x, n, c, i, j);
            dx[[n, c, a, b]] += g;
        }

        Ok(dx)
    }

    fn argmax(&self, x: ArrayView4<f32>, n: usize, c: usize, i: usize, j: usize) -> (usize, usize) {
        let p = self.size;
        let mut best = (i * p, j * p);

        for a in i * p..(i + 1) * p {
            for b in j * p..(j + 1) * p {
                if x[[n, c, a, b]] > x[[n, c, best.0, best.1]] {
                    best = (a, b);
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pools_and_routes_gradient_to_the_max() {
        let pool = MaxPool2d::new(2);
        let x = array![[1., 5., 0., 0., 9.], [2., 3., 0., 7., 9.], [4., 4., 4., 4., 9.]]
            .into_shape_with_order((1, 1, 3, 5))
            .unwrap();

        let y = pool.forward(x.view()).unwrap();
        assert_eq!(y, array![[[[5., 7.]]]]);

        let dx = pool.backward(x.view(), array![[[[1., 2.]]]].view()).unwrap();
        let expected = array![[0., 1., 0., 0., 0.], [0., 0., 0., 2., 0.], [0., 0., 0., 0., 0.]];
        assert_eq!(dx.slice(s![0, 0, .., ..]), expected);
    }

    #[test]
    fn ties_go_to_the_first_element() {
        let pool = MaxPool2d::new(2);
        let x = Array4::ones((1, 1, 2, 2));

        let dx = pool.backward(x.view(), Array4::ones((1, 1, 1, 1)).view()).unwrap();

        assert_eq!(dx.slice(s![0, 0, .., ..]), array![[1., 0.], [0., 0.]]);
    }
}
