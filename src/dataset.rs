//! Synthetic labeled datasets for training, tests and benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::vector::Sample;

/// A set of labeled samples.
#[derive(Clone, Debug, Default)]
pub struct LabeledDataset {
    pub samples: Vec<Sample>,
}

impl LabeledDataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Generate `classes` well-separated groups of `per_class` samples.
    ///
    /// Each class gets a random center in `[-1, 1]^dim`; its samples are
    /// drawn uniformly within `±spread` of that center on every axis.
    /// Labels are `0..classes`, and samples are interleaved by class.
    /// The same seed always produces the same dataset.
    pub fn generate_clustered(
        classes: usize,
        per_class: usize,
        dim: usize,
        spread: f32,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let spread = spread.abs();

        let centers: Vec<Vec<f32>> = (0..classes)
            .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..=1.0)).collect())
            .collect();

        let mut samples = Vec::with_capacity(classes * per_class);
        for _ in 0..per_class {
            for (label, center) in centers.iter().enumerate() {
                let data = center
                    .iter()
                    .map(|&c| c + rng.gen_range(-spread..=spread))
                    .collect();
                samples.push(Sample::new(label as i32, data));
            }
        }

        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn labels(&self) -> Vec<i32> {
        self.samples.iter().map(|s| s.label).collect()
    }

    /// Feature dimensionality of the first sample.
    pub fn dim(&self) -> Option<usize> {
        self.samples.first().map(Sample::dim)
    }
}
