/// Element-wise activation functions fused into the parametric layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActFn {
    Relu,
}

impl ActFn {
    pub fn relu() -> Self {
        Self::Relu
    }

    pub fn f(&self, z: f32) -> f32 {
        match self {
            ActFn::Relu => z.max(0.),
        }
    }

    /// The derivative, expressed in terms of the activation's *output* `a = f(z)`. This lets the
    /// backward pass work from the cached layer outputs alone.
    pub fn df(&self, a: f32) -> f32 {
        match self {
            ActFn::Relu => {
                if a > 0. {
                    1.
                } else {
                    0.
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_clips_negatives_and_gates_its_derivative() {
        let relu = ActFn::relu();

        assert_eq!(relu.f(-3.), 0.);
        assert_eq!(relu.f(2.5), 2.5);
        assert_eq!(relu.df(relu.f(-3.)), 0.);
        assert_eq!(relu.df(relu.f(2.5)), 1.);
    }
}
