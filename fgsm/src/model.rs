use machine_learning::arch::{
    Sequential,
    activations::ActFn,
    layers::Layer,
};

/// The shape of a single input image, `(channels, height, width)`.
pub const INPUT_SHAPE: (usize, usize, usize) = (1, 28, 28);

/// The amount of digit classes.
pub const NUM_CLASSES: usize = 10;

/// Builds the SimpleCNN digit classifier.
///
/// `(N, 1, 28, 28)` images go through two 3x3 convolutions, each followed by a 2x2 max pool, and
/// then through two dense layers that produce `(N, 10)` logits.
pub fn simple_cnn() -> Sequential {
    Sequential::new([
        Layer::conv2d(1, 8, 3, Some(ActFn::relu())),
        Layer::max_pool2d(2),
        Layer::conv2d(8, 16, 3, Some(ActFn::relu())),
        Layer::max_pool2d(2),
        Layer::flatten(),
        Layer::dense((16 * 5 * 5, 64), Some(ActFn::relu())),
        Layer::dense((64, NUM_CLASSES), None),
    ])
}
