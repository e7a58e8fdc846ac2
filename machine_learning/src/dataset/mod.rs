pub mod idx;
pub mod mnist;

use std::num::NonZeroUsize;

use ndarray::{Array4, ArrayView4, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in memory labeled image dataset, images are stored as `(samples, channels, height, width)`.
///
/// Shuffling only permutes the order `batches` visits the samples in, the storage order (the one
/// seen by `images`, `labels` and `sample`) never changes.
#[derive(Clone, Debug)]
pub struct Dataset {
    images: Array4<f32>,
    labels: Vec<usize>,
    order: Vec<usize>,
}

impl Dataset {
    /// Creates a new `Dataset`.
    ///
    /// # Returns
    /// An error if there isn't exactly one label per image.
    pub fn new(images: Array4<f32>, labels: Vec<usize>) -> Result<Self> {
        let len = images.len_of(Axis(0));
        if len != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "dataset labels",
                got: labels.len(),
                expected: len,
            });
        }

        Ok(Self {
            images,
            labels,
            order: (0..len).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn images(&self) -> ArrayView4<'_, f32> {
        self.images.view()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Returns the `index`-th sample as a batch of one, or `None` if out of bounds.
    pub fn sample(&self, index: usize) -> Option<(ArrayView4<'_, f32>, usize)> {
        let label = *self.labels.get(index)?;
        let image = self.images.slice(s![index..index + 1, .., .., ..]);
        Some((image, label))
    }

    /// Keeps only the first `n` samples.
    pub fn take(self, n: usize) -> Self {
        let n = n.min(self.len());
        let Self {
            images, mut labels, ..
        } = self;

        labels.truncate(n);
        Self {
            images: images.slice_move(s![..n, .., .., ..]),
            labels,
            order: (0..n).collect(),
        }
    }

    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.order.shuffle(rng);
    }

    /// Iterates over owned batches of at most `batch_size` samples, in the current order.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (Array4<f32>, Vec<usize>)> + '_ {
        self.order.chunks(batch_size.get()).map(|indices| {
            let images = self.images.select(Axis(0), indices);
            let labels = indices.iter().map(|&i| self.labels[i]).collect();
            (images, labels)
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn dataset(len: usize) -> Dataset {
        let images = Array4::from_shape_fn((len, 1, 2, 2), |(n, _, _, _)| n as f32);
        Dataset::new(images, (0..len).map(|i| i % 10).collect()).unwrap()
    }

    #[test]
    fn batches_cover_every_sample_once() {
        let mut ds = dataset(10);
        ds.shuffle(&mut StdRng::seed_from_u64(3));

        let batches: Vec<_> = ds.batches(NonZeroUsize::new(4).unwrap()).collect();
        let sizes: Vec<_> = batches.iter().map(|(_, labels)| labels.len()).collect();
        assert_eq!(sizes, [4, 4, 2]);

        let mut seen: Vec<usize> = batches
            .iter()
            .flat_map(|(images, labels)| {
                // every image is filled with its index, which must match its label.
                images
                    .outer_iter()
                    .zip(labels)
                    .map(|(image, &label)| {
                        let index = image[[0, 0, 0]] as usize;
                        assert_eq!(index % 10, label);
                        index
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn shuffle_keeps_storage_order() {
        let mut ds = dataset(6);
        ds.shuffle(&mut StdRng::seed_from_u64(1));

        let (image, label) = ds.sample(4).unwrap();
        assert_eq!(image.dim(), (1, 1, 2, 2));
        assert_eq!(image[[0, 0, 1, 1]], 4.);
        assert_eq!(label, 4);
        assert!(ds.sample(6).is_none());
    }

    #[test]
    fn take_truncates() {
        let ds = dataset(6).take(3);

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.images().dim(), (3, 1, 2, 2));
        assert_eq!(ds.labels(), &[0, 1, 2]);
        assert_eq!(dataset(2).take(5).len(), 2);
    }

    #[test]
    fn rejects_mismatched_labels() {
        let images = Array4::zeros((3, 1, 2, 2));

        assert!(matches!(
            Dataset::new(images, vec![0, 1]),
            Err(MlErr::SizeMismatch {
                what: "dataset labels",
                ..
            })
        ));
    }
}
