//! Scalar codecs: per-value byte quantization, sign bits, and nibble packing.
//!
//! These are cheaper, coarser alternatives to product quantization for
//! templates that only need a compact byte or bit form.

use serde::{Deserialize, Serialize};

use crate::error::{ForgePqError, Result};
use crate::vector::Sample;

/// Affine map from floats onto `0..=255`, fitted to the training range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarQuantizer {
    /// Scale.
    pub a: f32,
    /// Offset.
    pub b: f32,
}

impl Default for ScalarQuantizer {
    /// Identity map: values are only rounded and saturated.
    fn default() -> Self {
        Self { a: 1.0, b: 0.0 }
    }
}

impl ScalarQuantizer {
    /// Fit `a` and `b` so the smallest training value maps to 0 and the
    /// largest to 255.
    ///
    /// # Errors
    /// `EmptySampleSet` without values, `InvalidParameter` if the range is
    /// empty or not finite.
    pub fn train(samples: &[Sample]) -> Result<Self> {
        let mut values = samples.iter().flat_map(|s| s.data.iter().copied()).peekable();
        if values.peek().is_none() {
            return Err(ForgePqError::EmptySampleSet);
        }

        let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v as f64), hi.max(v as f64))
        });

        let range = max - min;
        if !range.is_finite() || range <= 0.0 {
            return Err(ForgePqError::invalid_parameter(format!(
                "cannot fit scalar quantizer to range [{}, {}]",
                min, max
            )));
        }

        let a = 255.0 / range;
        Ok(Self {
            a: a as f32,
            b: (-a * min) as f32,
        })
    }

    /// Map one value to a byte.
    #[inline]
    pub fn quantize_value(&self, x: f32) -> u8 {
        // `as` saturates and sends NaN to 0.
        (self.a * x + self.b).round() as u8
    }

    pub fn quantize(&self, vector: &[f32]) -> Vec<u8> {
        vector.iter().map(|&x| self.quantize_value(x)).collect()
    }
}

/// Pack the sign of each value into bits, eight values per byte.
///
/// Bit `k` of byte `j` is set when `vector[8j + k] > 0`.
///
/// # Errors
/// `DimensionNotDivisible` if the length is not a multiple of 8.
pub fn binarize(vector: &[f32]) -> Result<Vec<u8>> {
    if !vector.len().is_multiple_of(8) {
        return Err(ForgePqError::dimension_not_divisible(vector.len(), 8));
    }

    Ok(vector
        .chunks_exact(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (k, &v)| byte | (u8::from(v > 0.0) << k))
        })
        .collect())
}

/// Keep the high nibble of each byte, two bytes per output byte.
///
/// Output byte `j` is `(bytes[2j] & 0xF0) | (bytes[2j + 1] >> 4)`.
///
/// # Errors
/// `DimensionNotDivisible` if the length is odd.
pub fn pack_high_nibbles(bytes: &[u8]) -> Result<Vec<u8>> {
    if !bytes.len().is_multiple_of(2) {
        return Err(ForgePqError::dimension_not_divisible(bytes.len(), 2));
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| (pair[0] & 0xF0) | (pair[1] >> 4))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_quantizer_range() {
        let samples = vec![
            Sample::new(0, vec![-2.0, 0.0, 1.0]),
            Sample::new(1, vec![3.0, 0.5, -1.0]),
        ];
        let sq = ScalarQuantizer::train(&samples).unwrap();

        assert_eq!(sq.quantize_value(-2.0), 0);
        assert_eq!(sq.quantize_value(3.0), 255);
        assert_eq!(sq.quantize_value(0.5), 128);
        assert_eq!(sq.quantize(&[-2.0, 3.0]), vec![0, 255]);
    }

    #[test]
    fn test_scalar_quantizer_saturates() {
        let sq = ScalarQuantizer { a: 255.0, b: 0.0 };
        assert_eq!(sq.quantize_value(-5.0), 0);
        assert_eq!(sq.quantize_value(5.0), 255);
        assert_eq!(sq.quantize_value(f32::NAN), 0);
    }

    #[test]
    fn test_scalar_quantizer_rejects_flat_range() {
        let samples = vec![Sample::new(0, vec![1.0; 4])];
        assert!(matches!(
            ScalarQuantizer::train(&samples),
            Err(ForgePqError::InvalidParameter(_))
        ));
        assert!(matches!(
            ScalarQuantizer::train(&[]),
            Err(ForgePqError::EmptySampleSet)
        ));
    }

    #[test]
    fn test_binarize() {
        let mut v = vec![-1.0f32; 16];
        v[0] = 0.5;
        v[7] = 2.0;
        v[9] = 0.1;
        v[3] = 0.0;

        assert_eq!(binarize(&v).unwrap(), vec![0b1000_0001, 0b0000_0010]);
        assert!(matches!(
            binarize(&[1.0; 12]),
            Err(ForgePqError::DimensionNotDivisible { dim: 12, width: 8 })
        ));
    }

    #[test]
    fn test_pack_high_nibbles() {
        assert_eq!(
            pack_high_nibbles(&[0xAB, 0xCD, 0x1F, 0xF1]).unwrap(),
            vec![0xAC, 0x1F]
        );
        assert!(pack_high_nibbles(&[1, 2, 3]).is_err());
        assert!(pack_high_nibbles(&[]).unwrap().is_empty());
    }
}
