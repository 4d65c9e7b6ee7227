//! In-process driver (default, thread-safe).
//!
//! Uses DashMap for lock-free concurrent access with per-key sharding.
//! Values are stored encoded, so encode failures surface exactly as they do
//! on the other drivers. Expired entries are dropped lazily on access and by
//! [`MemoryDriver::purge_expired`].

use super::{dedup_keys, Driver, Stats};
use crate::config::MemoryDriverConfig;
use crate::error::{Error, Result};
use crate::key::KeyNamespace;
use crate::observability::DriverMetrics;
use crate::serialization::Codec;
use crate::value::Value;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stored entry with optional expiration.
struct Entry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        Entry { data, expires_at }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Thread-safe in-process driver.
///
/// Clones and `with_serializer` siblings share the same map.
///
/// # Example
///
/// ```
/// use cache_facade::driver::{Driver, MemoryDriver};
/// use cache_facade::config::MemoryDriverConfig;
/// use std::time::Duration;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> cache_facade::Result<()> {
///     let config = MemoryDriverConfig { enabled: true, ..Default::default() };
///     let driver = MemoryDriver::new(&config)?;
///
///     driver.set("key1", &"value".into(), Duration::ZERO).await?;
///     assert!(driver.has("key1").await);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct MemoryDriver {
    store: Arc<DashMap<String, Entry>>,
    namespace: KeyNamespace,
    codec: Codec,
    default_ttl: Duration,
    metrics: Arc<DriverMetrics>,
}

impl MemoryDriver {
    /// Create an empty in-process driver.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the driver is disabled.
    pub fn new(config: &MemoryDriverConfig) -> Result<Self> {
        if !config.enabled {
            return Err(Error::ConfigError(
                "memory driver is not enabled".to_string(),
            ));
        }

        let driver = MemoryDriver {
            store: Arc::new(DashMap::new()),
            namespace: KeyNamespace::new(config.prefix.clone()),
            codec: Codec::from_name(&config.serializer),
            default_ttl: config.default_ttl(),
            metrics: Arc::new(DriverMetrics::new()),
        };

        info!(
            "✓ Memory driver ready (serializer: {}, default TTL: {:?})",
            driver.codec, driver.default_ttl
        );
        Ok(driver)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.store.iter().filter(|e| !e.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.store.len();
        self.store.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.store.len());
        if removed > 0 {
            debug!("✓ Memory purged {} expired entries", removed);
        }
        removed
    }

    fn read(&self, key: &str) -> Option<Value> {
        let full = self.namespace.qualify(key);
        let bytes = match self.store.get(&full) {
            Some(entry) if !entry.is_expired() => Some(entry.data.clone()),
            _ => None,
        };

        let Some(bytes) = bytes else {
            // drop the entry if it was present but expired
            self.store.remove_if(&full, |_, entry| entry.is_expired());
            self.metrics.record_miss(key);
            return None;
        };

        match self.codec.decode(&bytes) {
            Ok(value) => {
                self.metrics.record_hit(key);
                Some(value)
            }
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                None
            }
        }
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn get(&self, key: &str) -> Option<Value> {
        self.read(key)
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let bytes = self.codec.encode(value)?;
        self.store
            .insert(self.namespace.qualify(key), Entry::new(bytes, ttl));

        debug!("✓ Memory SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn has(&self, key: &str) -> bool {
        self.store
            .get(&self.namespace.qualify(key))
            .is_some_and(|entry| !entry.is_expired())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(&self.namespace.qualify(key));
        debug!("✓ Memory DELETE {}", key);
        Ok(())
    }

    async fn get_multiple(&self, keys: &[&str]) -> (HashMap<String, Value>, Vec<String>) {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        for key in dedup_keys(keys) {
            match self.read(key) {
                Some(v) => {
                    found.insert(key.to_string(), v);
                }
                None => missing.push(key.to_string()),
            }
        }
        (found, missing)
    }

    /// Encodes everything first; the inserts themselves cannot fail, so the
    /// batch is all-or-nothing.
    async fn set_multiple(&self, values: &HashMap<String, Value>, ttl: Duration) -> Result<()> {
        let mut encoded = Vec::with_capacity(values.len());
        for (key, value) in values {
            encoded.push((self.namespace.qualify(key), self.codec.encode(value)?));
        }
        for (key, bytes) in encoded {
            self.store.insert(key, Entry::new(bytes, ttl));
        }

        debug!("✓ Memory SET_MULTIPLE {} keys", values.len());
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.store.remove(&self.namespace.qualify(key));
        }
        debug!("✓ Memory DELETE_MULTIPLE {} keys", keys.len());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let prefix = self.namespace.prefix().to_string();
        self.store.retain(|k, _| !k.starts_with(&prefix));
        warn!("⚠ Memory FLUSH executed - namespace {} cleared", prefix);
        Ok(())
    }

    async fn stats(&self) -> Stats {
        let prefix = self.namespace.prefix();
        let (count, bytes) = self
            .store
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.is_expired())
            .fold((0usize, 0usize), |(n, b), e| (n + 1, b + e.data.len()));

        let mut stats = Stats::new();
        stats.insert("type".into(), Value::from("memory"));
        stats.insert("prefix".into(), Value::from(prefix));
        stats.insert("serializer".into(), Value::from(self.codec.name()));
        stats.insert("count".into(), Value::from(count));
        stats.insert("bytes".into(), Value::from(bytes));
        stats.insert("hits".into(), Value::from(self.metrics.hits()));
        stats.insert("misses".into(), Value::from(self.metrics.misses()));
        stats
    }

    /// Clears the map. Idempotent.
    async fn close(&self) -> Result<()> {
        self.store.clear();
        Ok(())
    }

    fn with_serializer(&self, serializer: &str) -> Arc<dyn Driver> {
        Arc::new(MemoryDriver {
            codec: Codec::from_name(serializer),
            ..self.clone()
        })
    }

    fn codec(&self) -> Codec {
        self.codec
    }

    fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}
