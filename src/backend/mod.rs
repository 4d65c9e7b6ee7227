//! Backend command executors.
//!
//! A [`CommandExecutor`] is the opaque handle a network-backed driver talks
//! to. It knows nothing about namespaces, codecs or default TTLs: keys
//! arrive fully qualified and values arrive as bytes. Connection pooling,
//! TLS and topology are the executor's business. A [`DocumentStore`] plays
//! the same role for document databases.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub mod document;
#[cfg(feature = "document")]
pub mod mongo;
#[cfg(feature = "redis")]
pub mod redis;

pub use document::{DocumentStore, StoredDocument};
#[cfg(feature = "document")]
pub use mongo::{MongoConfig, MongoStore};
#[cfg(feature = "redis")]
pub use self::redis::{PoolStats, RedisConfig, RedisExecutor};

/// One page of a cursor-driven key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` means the scan is complete.
    pub cursor: u64,
    /// Keys found on this page. May be empty even when `cursor != 0`.
    pub keys: Vec<String>,
}

/// Command set a key-value backend must offer.
///
/// **IMPORTANT:** All methods take `&self`; implementations must be safe for
/// concurrent use (pooled connections, interior mutability).
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Retrieve raw bytes. `Ok(None)` is a miss.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs (connection lost, etc.)
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store raw bytes. `ttl == Duration::ZERO` stores without expiry.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Check key existence without reading the value.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remove keys; returns how many existed. Absent keys are not an error.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Bulk get. The result has one slot per requested key, in order.
    ///
    /// Default implementation calls `get()` for each key.
    /// Override for batch efficiency (e.g., Redis MGET).
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            results.push(self.get(key).await?);
        }
        Ok(results)
    }

    /// Bulk set with one TTL applied to every entry.
    ///
    /// Default implementation calls `set()` for each entry and stops at the
    /// first failure, leaving earlier entries written.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn mset(&self, entries: Vec<(String, Vec<u8>)>, ttl: Duration) -> Result<()> {
        for (key, value) in entries {
            self.set(&key, value, ttl).await?;
        }
        Ok(())
    }

    /// One step of a cursor scan over keys matching a glob `pattern`.
    ///
    /// Start with cursor `0`; continue with the returned cursor until it is
    /// `0` again. `count` is a hint for the page size.
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage>;

    /// Free-form diagnostic text (Redis `INFO`).
    ///
    /// # Errors
    /// Returns `Err` if backend error occurs
    async fn info(&self) -> Result<String> {
        Ok(String::new())
    }

    /// Connectivity check used by driver constructors.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn ping(&self) -> Result<()>;

    /// Release connections. Calls after the first must not panic.
    ///
    /// # Errors
    /// Returns `Err` if the backend reports a shutdown failure
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
