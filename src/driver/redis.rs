//! Network key-value driver.
//!
//! Translates caller-level `(key, value, ttl)` into backend-level
//! `(namespaced key, bytes, ttl)` over a [`CommandExecutor`]. The driver
//! holds no entries of its own.
//!
//! Batch semantics:
//! - `get_multiple` issues one MGET; unreadable slots become misses.
//! - `set_multiple` encodes every value first, then sends one pipeline of
//!   independent SETs. A backend failure part-way may leave a prefix of the
//!   batch written; the error is returned and nothing is rolled back.
//! - `flush` and `stats` walk the namespace with SCAN, page by page.

use super::{dedup_keys, Driver, Stats};
use crate::backend::CommandExecutor;
use crate::config::RedisDriverConfig;
use crate::error::{Error, Result};
use crate::key::KeyNamespace;
use crate::observability::DriverMetrics;
use crate::scan::KeyScanner;
use crate::serialization::Codec;
use crate::value::Value;
use async_trait::async_trait;
use futures::stream::{Stream, TryStreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Driver over a Redis-compatible command executor.
///
/// # Example
///
/// ```ignore
/// # use cache_facade::backend::{RedisConfig, RedisExecutor};
/// # use cache_facade::config::RedisDriverConfig;
/// # use cache_facade::driver::{Driver, RedisDriver};
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # async fn example() -> cache_facade::Result<()> {
/// let executor = Arc::new(RedisExecutor::new(RedisConfig::default())?);
/// let config = RedisDriverConfig { enabled: true, default_ttl: 300, ..Default::default() };
///
/// let driver = RedisDriver::connect(&config, Some(executor)).await?;
/// driver.set("greeting", &"hello".into(), Duration::from_secs(60)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisDriver {
    executor: Arc<dyn CommandExecutor>,
    namespace: KeyNamespace,
    codec: Codec,
    default_ttl: Duration,
    scan_count: usize,
    metrics: Arc<DriverMetrics>,
    closed: Arc<AtomicBool>,
}

impl RedisDriver {
    /// Build a driver and ping the backend.
    ///
    /// # Errors
    /// - `Error::ConfigError` if the driver is disabled or `executor` is `None`
    /// - the ping error (usually `Error::BackendError`) if `ping` fails
    pub async fn connect(
        config: &RedisDriverConfig,
        executor: Option<Arc<dyn CommandExecutor>>,
    ) -> Result<Self> {
        if !config.enabled {
            return Err(Error::ConfigError(
                "redis driver is not enabled".to_string(),
            ));
        }
        let executor = executor.ok_or_else(|| {
            Error::ConfigError("redis executor cannot be nil".to_string())
        })?;

        executor.ping().await?;

        let driver = RedisDriver {
            executor,
            namespace: KeyNamespace::new(config.prefix.clone()),
            codec: Codec::from_name(&config.serializer),
            default_ttl: config.default_ttl(),
            scan_count: config.scan_count,
            metrics: Arc::new(DriverMetrics::new()),
            closed: Arc::new(AtomicBool::new(false)),
        };

        info!(
            "✓ Redis driver ready (prefix: {}, serializer: {}, default TTL: {:?})",
            driver.namespace.prefix(),
            driver.codec,
            driver.default_ttl
        );

        Ok(driver)
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    fn scanner(&self) -> KeyScanner {
        KeyScanner::new(
            Arc::clone(&self.executor),
            self.namespace.pattern(),
            self.scan_count,
        )
    }

    /// Lazy stream of this driver's logical keys, one SCAN page per item,
    /// with the namespace prefix stripped.
    pub fn logical_keys(&self) -> impl Stream<Item = Result<Vec<String>>> + Send + 'static {
        let namespace = self.namespace.clone();
        self.scanner().batches().map_ok(move |raw| {
            raw.iter()
                .filter_map(|k| namespace.strip(k).map(str::to_string))
                .collect()
        })
    }

    fn decode(&self, key: &str, bytes: &[u8]) -> Option<Value> {
        match self.codec.decode(bytes) {
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
impl Driver for RedisDriver {
    async fn get(&self, key: &str) -> Option<Value> {
        match self.executor.get(&self.namespace.qualify(key)).await {
            Ok(Some(bytes)) => self.decode(key, &bytes),
            Ok(None) => {
                self.metrics.record_miss(key);
                None
            }
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let bytes = self.codec.encode(value)?;
        self.executor
            .set(&self.namespace.qualify(key), bytes, ttl)
            .await?;

        debug!("✓ Redis SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn has(&self, key: &str) -> bool {
        match self.executor.exists(&self.namespace.qualify(key)).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Redis EXISTS {} failed (treated as absent): {}", key, e);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.executor
            .delete(&[self.namespace.qualify(key)])
            .await?;

        debug!("✓ Redis DELETE {}", key);
        Ok(())
    }

    async fn get_multiple(&self, keys: &[&str]) -> (HashMap<String, Value>, Vec<String>) {
        let keys = dedup_keys(keys);
        let mut found = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        if keys.is_empty() {
            return (found, missing);
        }

        let qualified: Vec<String> = keys.iter().map(|k| self.namespace.qualify(k)).collect();
        let slots = match self.executor.mget(&qualified).await {
            Ok(slots) => slots,
            Err(e) => {
                warn!("Redis MGET failed, reporting {} keys as missing: {}", keys.len(), e);
                return (found, keys.into_iter().map(str::to_string).collect());
            }
        };

        for (i, key) in keys.into_iter().enumerate() {
            let value = match slots.get(i) {
                Some(Some(bytes)) => self.decode(key, bytes),
                _ => {
                    self.metrics.record_miss(key);
                    None
                }
            };
            match value {
                Some(v) => {
                    found.insert(key.to_string(), v);
                }
                None => missing.push(key.to_string()),
            }
        }

        debug!(
            "✓ Redis MGET {} keys ({} found, {} missing)",
            found.len() + missing.len(),
            found.len(),
            missing.len()
        );
        (found, missing)
    }

    async fn set_multiple(&self, values: &HashMap<String, Value>, ttl: Duration) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(values.len());
        for (key, value) in values {
            let bytes = self.codec.encode(value).map_err(|e| {
                debug!("Redis SET_MULTIPLE aborted at {}: {}", key, e);
                e
            })?;
            entries.push((self.namespace.qualify(key), bytes));
        }

        let count = entries.len();
        self.executor.mset(entries, ttl).await?;

        debug!("✓ Redis SET_MULTIPLE {} keys (TTL: {:?})", count, ttl);
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let qualified: Vec<String> = keys.iter().map(|k| self.namespace.qualify(k)).collect();
        self.executor.delete(&qualified).await?;

        debug!("✓ Redis DELETE_MULTIPLE {} keys", qualified.len());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let removed = self.scanner().delete_all().await?;
        warn!(
            "⚠ Redis FLUSH removed {} keys under {}",
            removed,
            self.namespace.prefix()
        );
        Ok(())
    }

    async fn stats(&self) -> Stats {
        let mut stats = Stats::new();
        stats.insert("type".into(), Value::from("redis"));
        stats.insert("prefix".into(), Value::from(self.namespace.prefix()));
        stats.insert("serializer".into(), Value::from(self.codec.name()));
        stats.insert("hits".into(), Value::from(self.metrics.hits()));
        stats.insert("misses".into(), Value::from(self.metrics.misses()));

        match self.scanner().count().await {
            Ok(count) => {
                stats.insert("count".into(), Value::from(count));
            }
            Err(e) => {
                stats.insert("count".into(), Value::Int(0));
                stats.insert("error".into(), Value::from(e.to_string()));
            }
        }

        match self.executor.info().await {
            Ok(info) => {
                stats.insert("info".into(), Value::from(info));
            }
            Err(e) => {
                debug!("Redis INFO unavailable: {}", e);
            }
        }

        stats
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Redis driver already closed");
            return Ok(());
        }
        self.executor.close().await
    }

    fn with_serializer(&self, serializer: &str) -> Arc<dyn Driver> {
        Arc::new(RedisDriver {
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
