//! Versioned postcard envelope used by the native codec.
//!
//! ```text
//! ┌─────────────────┬─────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│VERSION (varint) │POSTCARD PAYLOAD (N bytes)│
//! └─────────────────┴─────────────────┴──────────────────────────┘
//!   "CKIT"              u32                postcard::to_allocvec(T)
//! ```
//!
//! Magic and version are checked on every decode so that bytes written by a
//! different codec, or by an older schema, read as a miss instead of as a
//! garbled value.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for native entries: b"CKIT"
pub const CACHE_MAGIC: [u8; 4] = *b"CKIT";

/// Current schema version of the native encoding.
///
/// Bump when `Value` changes shape (variants added, removed or reordered).
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Versioned envelope for native entries.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    pub magic: [u8; 4],
    pub version: u32,
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Wrap `value` in an envelope and encode it with postcard.
///
/// # Errors
///
/// Returns `Error::SerializationError` if postcard fails.
pub fn seal<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(&CacheEnvelope::new(value)).map_err(|e| {
        error!("Native serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode an envelope and return its payload after validating the header.
///
/// # Errors
///
/// - `Error::DeserializationError`: bytes are not a postcard envelope
/// - `Error::InvalidCacheEntry`: magic header mismatch
/// - `Error::VersionMismatch`: written by another schema version
pub fn open<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        debug!("Native envelope decode failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Cache version mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
