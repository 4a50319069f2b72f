//! Blob header definitions for forge-pq persistence.

use crate::error::{ForgePqError, Result};

/// Magic bytes identifying a forge-pq blob: "FORGEPQ\0"
pub const MAGIC: [u8; 8] = *b"FORGEPQ\0";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Blob format flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatFlags {
    bits: u32,
}

impl FormatFlags {
    /// No special flags.
    pub const NONE: u32 = 0;
    /// Lookup tables hold log-likelihood ratios rather than distances.
    pub const CALIBRATED: u32 = 1 << 0;

    /// Create new flags from bits.
    pub fn new(bits: u32) -> Self {
        Self { bits }
    }

    /// Get the raw bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Check if a flag is set.
    pub fn has(&self, flag: u32) -> bool {
        self.bits & flag != 0
    }

    /// Set a flag.
    pub fn set(&mut self, flag: u32) {
        self.bits |= flag;
    }
}

/// Blob header structure.
///
/// Total size: 24 bytes
/// ```text
/// [MAGIC 8B][VERSION u32][FLAGS u32][SUBSPACES u32][CHECKSUM u32]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeader {
    /// Magic bytes (must be MAGIC)
    pub magic: [u8; 8],
    /// Format version
    pub version: u32,
    /// Format flags
    pub flags: FormatFlags,
    /// Number of subspaces stored in the body
    pub subspaces: u32,
    /// CRC32 checksum of the body (everything after the header)
    pub checksum: u32,
}

impl BlobHeader {
    /// Header size in bytes.
    pub const SIZE: usize = 24;

    /// Create a header for the current format version.
    pub fn new(flags: FormatFlags, subspaces: u32, checksum: u32) -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            flags,
            subspaces,
            checksum,
        }
    }

    /// Serialize header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..8].copy_from_slice(&self.magic);
        bytes[8..12].copy_from_slice(&self.version.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.flags.bits().to_le_bytes());
        bytes[16..20].copy_from_slice(&self.subspaces.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(ForgePqError::invalid_format("header too small"));
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);

        if magic != MAGIC {
            return Err(ForgePqError::invalid_format("invalid magic bytes"));
        }

        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        Ok(Self {
            magic,
            version: word(8),
            flags: FormatFlags::new(word(12)),
            subspaces: word(16),
            checksum: word(20),
        })
    }

    /// Verify the header is one this build can read.
    pub fn verify(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(ForgePqError::invalid_format("invalid magic bytes"));
        }

        if self.version == 0 || self.version > FORMAT_VERSION {
            return Err(ForgePqError::invalid_format(format!(
                "unsupported version {} (max supported: {})",
                self.version, FORMAT_VERSION
            )));
        }

        if self.subspaces == 0 {
            return Err(ForgePqError::invalid_format("blob declares zero subspaces"));
        }

        Ok(())
    }
}
