//! Core newtypes for type-safe quantizer operations.
//!
//! These types provide compile-time guarantees that prevent mixing up
//! related but semantically different values (e.g., a quantizer identity
//! vs. a registry version, or a code vs. an arbitrary byte buffer).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use uuid::Uuid;

/// Stable identity of a trained quantizer.
///
/// Generated once when a quantizer is constructed and persisted with it, so a
/// deserialized quantizer republishes its tables under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct QuantizerId(pub Uuid);

impl QuantizerId {
    /// Generate a fresh random identity.
    #[inline]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[inline]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for QuantizerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuantizerId({})", self.0)
    }
}

impl From<Uuid> for QuantizerId {
    #[inline]
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// The dimensionality of feature vectors handled by a quantizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Dimension(pub usize);

impl Dimension {
    /// Create a new Dimension.
    #[inline]
    pub const fn new(dim: usize) -> Self {
        Self(dim)
    }

    /// Get the raw usize value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if this dimension is divisible by a given number.
    #[inline]
    pub fn is_divisible_by(self, divisor: usize) -> bool {
        divisor != 0 && self.0.is_multiple_of(divisor)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for Dimension {
    #[inline]
    fn from(dim: usize) -> Self {
        Self(dim)
    }
}

/// A product-quantized vector: one center index per subspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct QuantizedCode(pub Vec<u8>);

impl QuantizedCode {
    /// Wrap raw code bytes.
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Borrow the code bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the code and return its bytes.
    #[inline]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl Deref for QuantizedCode {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for QuantizedCode {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for QuantizedCode {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}
