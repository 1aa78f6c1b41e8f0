//! Block compression for batch payloads.
//!
//! Two algorithms plus passthrough:
//! - **LZ4**: ultra-fast, moderate ratio; the default for latency-sensitive
//!   produce paths
//! - **Zstd**: better ratio at lower speed; worth it on fat batches or slow
//!   links

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound a compressed payload may claim to decompress to (64 MiB) -
/// guards against a corrupt or hostile size prefix.
const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Zstd compression level used for batches.
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("LZ4 error: {0}")]
    Lz4(String),

    #[error("Zstd error: {0}")]
    Zstd(String),

    #[error("Unknown codec id: {0}")]
    UnknownCodec(u8),
}

/// Compression codec applied to a serialized message batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Codec {
    /// Passthrough for tiny or already-compressed payloads.
    None = 0,
    /// LZ4 block format with a length prefix.
    #[default]
    Lz4 = 1,
    /// Zstd block format.
    Zstd = 2,
}

impl Codec {
    /// Parse a codec from its wire id.
    pub fn from_id(id: u8) -> Result<Self, CompressionError> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => Ok(Self::Zstd),
            other => Err(CompressionError::UnknownCodec(other)),
        }
    }

    /// Wire id of this codec.
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Human-readable name for log fields.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }

    /// Compress a payload.
    pub fn compress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
            Self::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL)
                .map_err(|e| CompressionError::Zstd(e.to_string())),
        }
    }

    /// Decompress a payload produced by [`Codec::compress`].
    pub fn decompress(self, data: &[u8]) -> Result<Vec<u8>, CompressionError> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Lz4 => lz4_flex::decompress_size_prepended(data)
                .map_err(|e| CompressionError::Lz4(e.to_string())),
            Self::Zstd => zstd::bulk::decompress(data, MAX_DECOMPRESSED_SIZE)
                .map_err(|e| CompressionError::Zstd(e.to_string())),
        }
    }
}
