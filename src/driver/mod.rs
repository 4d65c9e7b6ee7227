//! The uniform cache capability set and its backend implementations.
//!
//! | Driver          | Backend                         | `type` in stats |
//! |-----------------|---------------------------------|-----------------|
//! | [`MemoryDriver`] | process-local `DashMap`        | `memory`        |
//! | [`FileDriver`]   | one file per entry in a directory | `file`       |
//! | [`RedisDriver`]  | any [`CommandExecutor`](crate::backend::CommandExecutor) | `redis` |
//! | [`DocumentDriver`] | any [`DocumentStore`](crate::backend::DocumentStore) | `mongodb` |
//!
//! Every driver namespaces keys, encodes values with its [`Codec`], and
//! reports read-path failures as misses.

use crate::error::Result;
use crate::serialization::Codec;
use crate::value::Value;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

pub mod document;
#[cfg(feature = "file")]
pub mod file;
#[cfg(feature = "inmemory")]
pub mod memory;
pub mod redis;

pub use document::DocumentDriver;
#[cfg(feature = "file")]
pub use file::FileDriver;
#[cfg(feature = "inmemory")]
pub use memory::MemoryDriver;
pub use redis::RedisDriver;

/// Driver diagnostics. Always holds `type`, `prefix` and `count`.
pub type Stats = BTreeMap<String, Value>;

/// Deferred computation for [`Driver::remember`].
pub type Compute<'a> = Box<dyn FnOnce() -> BoxFuture<'a, Result<Value>> + Send + 'a>;

/// Box an async closure into a [`Compute`].
///
/// ```
/// use cache_facade::driver::compute;
/// use cache_facade::Value;
///
/// let c = compute(|| async { Ok(Value::from("computed")) });
/// # drop(c);
/// ```
pub fn compute<'a, F, Fut>(f: F) -> Compute<'a>
where
    F: FnOnce() -> Fut + Send + 'a,
    Fut: std::future::Future<Output = Result<Value>> + Send + 'a,
{
    Box::new(move || Box::pin(f()) as BoxFuture<'a, Result<Value>>)
}

/// Uniform cache operations, implemented once per backend.
///
/// TTL convention: `Duration::ZERO` means "never expires" in `set` and
/// `set_multiple`. The configured default TTL is applied only by
/// [`Driver::remember`].
#[async_trait]
pub trait Driver: Send + Sync {
    /// Retrieve a value. Backend and decode errors are reported as `None`.
    async fn get(&self, key: &str) -> Option<Value>;

    /// Encode and store a value.
    ///
    /// # Errors
    /// - `Error::SerializationError` if the codec cannot encode `value`
    ///   (nothing is written)
    /// - `Error::BackendError` if the write fails
    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()>;

    /// Existence check; does not decode the value. Errors read as `false`.
    async fn has(&self, key: &str) -> bool;

    /// Remove a key. Removing an absent key succeeds.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the delete fails
    async fn delete(&self, key: &str) -> Result<()>;

    /// Batch read. Returns found values and, in input order, the keys that
    /// were absent or unreadable. Together they cover the input exactly once
    /// (duplicated input keys are reported once).
    async fn get_multiple(&self, keys: &[&str]) -> (HashMap<String, Value>, Vec<String>);

    /// Batch write with one TTL for every entry.
    ///
    /// All values are encoded before anything is written, so a
    /// serialization failure writes nothing. Backend partial-failure
    /// behavior is documented per driver.
    ///
    /// # Errors
    /// - `Error::SerializationError` on the first value that cannot be encoded
    /// - `Error::BackendError` if the write fails
    async fn set_multiple(&self, values: &HashMap<String, Value>, ttl: Duration) -> Result<()>;

    /// Batch delete. Absent keys are ignored.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the delete fails
    async fn delete_multiple(&self, keys: &[&str]) -> Result<()>;

    /// Remove every entry in this driver's namespace, leaving other data in
    /// a shared backend untouched.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if enumeration or deletion fails
    async fn flush(&self) -> Result<()>;

    /// Diagnostics: `type`, `prefix`, `count`, `hits`, `misses`,
    /// `serializer` and backend-specific fields. A failed count is reported
    /// under `error` rather than as a failure.
    async fn stats(&self) -> Stats;

    /// Release backend resources. Closing twice succeeds.
    ///
    /// # Errors
    /// Returns `Error::BackendError` if the backend reports a shutdown failure
    async fn close(&self) -> Result<()>;

    /// A new driver over the same backend that encodes with `serializer`
    /// (resolved by [`Codec::from_name`]). The receiver is unchanged.
    fn with_serializer(&self, serializer: &str) -> Arc<dyn Driver>;

    /// The codec used for values.
    fn codec(&self) -> Codec;

    /// TTL used by [`Driver::remember`] when called with `Duration::ZERO`.
    fn default_ttl(&self) -> Duration {
        Duration::ZERO
    }

    /// Cache-aside: return the cached value, or compute, store and return it.
    ///
    /// - On a hit, `compute` is not called.
    /// - If `compute` fails, its error is returned unchanged and nothing is
    ///   written.
    /// - If storing the computed value fails, the failure is logged and the
    ///   computed value is still returned.
    ///
    /// `ttl == Duration::ZERO` selects [`Driver::default_ttl`].
    ///
    /// Concurrent misses on one key each run `compute` and each write; the
    /// last write wins. There is no per-key in-flight guard.
    ///
    /// # Errors
    /// Only the error returned by `compute`.
    async fn remember(&self, key: &str, ttl: Duration, compute: Compute<'_>) -> Result<Value> {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }

        let value = compute().await?;

        let ttl = if ttl.is_zero() { self.default_ttl() } else { ttl };
        if let Err(e) = self.set(key, &value, ttl).await {
            warn!("Remember: storing computed value for {} failed: {}", key, e);
        }

        Ok(value)
    }
}

/// Input keys with duplicates removed, first occurrence kept.
pub(crate) fn dedup_keys<'a>(keys: &[&'a str]) -> Vec<&'a str> {
    let mut seen = std::collections::HashSet::with_capacity(keys.len());
    keys.iter().copied().filter(|k| seen.insert(*k)).collect()
}
