use rand::Rng;
use std::sync::Arc;

/// A labeled feature vector used for training.
/// The data is stored in an Arc for cheap cloning.
#[derive(Clone, Debug)]
pub struct Sample {
    pub label: i32,
    pub data: Arc<[f32]>,
}

impl Sample {
    /// Create a new sample with the given class label and data.
    pub fn new(label: i32, data: Vec<f32>) -> Self {
        Self {
            label,
            data: data.into(),
        }
    }

    /// Create a random sample with values uniformly distributed in [-1.0, 1.0].
    pub fn random<R: Rng + ?Sized>(rng: &mut R, label: i32, dim: usize) -> Self {
        let data: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
        Self::new(label, data)
    }

    /// Return the dimensionality of this sample.
    pub fn dim(&self) -> usize {
        self.data.len()
    }
}

/// A dense row-major matrix of `f32`.
///
/// Codebooks and per-subspace training slices are stored this way so that a
/// row is a contiguous `&[f32]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// Create a zero-filled matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wrap row-major data. Returns `None` if the length does not match.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == rows * cols).then_some(Self { rows, cols, data })
    }

    /// Gather columns `[start, end)` of every sample into a new matrix.
    pub fn from_column_range(samples: &[Sample], start: usize, end: usize) -> Self {
        let cols = end - start;
        let mut data = Vec::with_capacity(samples.len() * cols);
        for s in samples {
            data.extend_from_slice(&s.data[start..end]);
        }
        Self {
            rows: samples.len(),
            cols,
            data,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// Iterate over rows in order.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    /// Return the raw row-major storage.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Consume the matrix and return its row-major storage.
    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}
