//! Document-store driver.
//!
//! One document per namespaced key over a [`DocumentStore`]. Expiry is kept
//! on the document and checked on every read, independent of when the
//! backend reaps it.
//!
//! Batch semantics:
//! - `get_multiple` issues one `find_many`; expired or undecodable
//!   documents become misses.
//! - `set_multiple` encodes every value first, then upserts document by
//!   document. A backend failure part-way leaves earlier documents written.
//! - `flush` removes the namespace with one `delete_matching`; `stats`
//!   counts it through the `keys_matching` cursor.

use super::{dedup_keys, Driver, Stats};
use crate::backend::{DocumentStore, StoredDocument};
use crate::config::DocumentDriverConfig;
use crate::error::{Error, Result};
use crate::key::KeyNamespace;
use crate::observability::DriverMetrics;
use crate::serialization::Codec;
use crate::value::Value;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn expires_at(ttl: Duration) -> Option<u64> {
    (!ttl.is_zero())
        .then(|| now_ms().saturating_add(ttl.as_millis().min(u64::MAX as u128) as u64))
}

/// Driver over a document store (MongoDB with the `document` feature).
///
/// # Example
///
/// ```ignore
/// # use cache_facade::backend::{MongoConfig, MongoStore};
/// # use cache_facade::config::DocumentDriverConfig;
/// # use cache_facade::driver::{DocumentDriver, Driver};
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # async fn example() -> cache_facade::Result<()> {
/// let store = Arc::new(MongoStore::connect(MongoConfig::default()).await?);
/// let config = DocumentDriverConfig { enabled: true, ..Default::default() };
///
/// let driver = DocumentDriver::connect(&config, Some(store)).await?;
/// driver.set("greeting", &"hello".into(), Duration::from_secs(60)).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DocumentDriver {
    store: Arc<dyn DocumentStore>,
    namespace: KeyNamespace,
    codec: Codec,
    default_ttl: Duration,
    metrics: Arc<DriverMetrics>,
    closed: Arc<AtomicBool>,
}

impl DocumentDriver {
    /// Build a driver and ping the backend.
    ///
    /// # Errors
    /// - `Error::ConfigError` if the driver is disabled or `store` is `None`
    /// - the ping error (usually `Error::BackendError`) if `ping` fails
    pub async fn connect(
        config: &DocumentDriverConfig,
        store: Option<Arc<dyn DocumentStore>>,
    ) -> Result<Self> {
        if !config.enabled {
            return Err(Error::ConfigError(
                "mongodb driver is not enabled".to_string(),
            ));
        }
        let store = store
            .ok_or_else(|| Error::ConfigError("document store cannot be nil".to_string()))?;

        store.ping().await?;

        let driver = DocumentDriver {
            store,
            namespace: KeyNamespace::new(config.prefix.clone()),
            codec: Codec::from_name(&config.serializer),
            default_ttl: config.default_ttl(),
            metrics: Arc::new(DriverMetrics::new()),
            closed: Arc::new(AtomicBool::new(false)),
        };

        info!(
            "✓ Document driver ready (prefix: {}, serializer: {}, default TTL: {:?})",
            driver.namespace.prefix(),
            driver.codec,
            driver.default_ttl
        );
        Ok(driver)
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    fn document(&self, key: &str, value: &Value, ttl: Duration) -> Result<StoredDocument> {
        Ok(StoredDocument {
            key: self.namespace.qualify(key),
            payload: self.codec.encode(value)?,
            expires_at_ms: expires_at(ttl),
        })
    }

    /// Decode a live document, counting the outcome.
    fn read(&self, key: &str, document: Option<StoredDocument>, now: u64) -> Option<Value> {
        match document.filter(|d| !d.is_expired(now)) {
            Some(document) => match self.codec.decode(&document.payload) {
                Ok(value) => {
                    self.metrics.record_hit(key);
                    Some(value)
                }
                Err(e) => {
                    self.metrics.record_error(key, &e.to_string());
                    None
                }
            },
            None => {
                self.metrics.record_miss(key);
                None
            }
        }
    }
}

#[async_trait]
impl Driver for DocumentDriver {
    async fn get(&self, key: &str) -> Option<Value> {
        match self.store.find(&self.namespace.qualify(key)).await {
            Ok(document) => self.read(key, document, now_ms()),
            Err(e) => {
                self.metrics.record_error(key, &e.to_string());
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let document = self.document(key, value, ttl)?;
        self.store.upsert(document).await?;

        debug!("✓ Document SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn has(&self, key: &str) -> bool {
        match self.store.find(&self.namespace.qualify(key)).await {
            Ok(document) => document.is_some_and(|d| !d.is_expired(now_ms())),
            Err(e) => {
                warn!("Document HAS {} failed (treated as absent): {}", key, e);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(&[self.namespace.qualify(key)]).await?;
        debug!("✓ Document DELETE {}", key);
        Ok(())
    }

    async fn get_multiple(&self, keys: &[&str]) -> (HashMap<String, Value>, Vec<String>) {
        let keys = dedup_keys(keys);
        let mut found = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();
        if keys.is_empty() {
            return (found, missing);
        }

        let full: Vec<String> = keys.iter().map(|k| self.namespace.qualify(k)).collect();
        let mut documents: HashMap<String, StoredDocument> = match self.store.find_many(&full).await
        {
            Ok(documents) => documents.into_iter().map(|d| (d.key.clone(), d)).collect(),
            Err(e) => {
                warn!("Document FIND_MANY failed ({} keys reported missing): {}", keys.len(), e);
                return (found, keys.iter().map(|k| k.to_string()).collect());
            }
        };

        let now = now_ms();
        for (key, full_key) in keys.iter().zip(&full) {
            match self.read(key, documents.remove(full_key), now) {
                Some(value) => {
                    found.insert(key.to_string(), value);
                }
                None => missing.push(key.to_string()),
            }
        }
        (found, missing)
    }

    async fn set_multiple(&self, values: &HashMap<String, Value>, ttl: Duration) -> Result<()> {
        let documents = values
            .iter()
            .map(|(key, value)| self.document(key, value, ttl))
            .collect::<Result<Vec<_>>>()?;
        let count = documents.len();
        if count == 0 {
            return Ok(());
        }
        self.store.upsert_many(documents).await?;

        debug!("✓ Document SET_MULTIPLE {} keys", count);
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let full: Vec<String> = keys.iter().map(|k| self.namespace.qualify(k)).collect();
        let removed = self.store.delete(&full).await?;
        debug!("✓ Document DELETE_MULTIPLE {} keys ({} existed)", keys.len(), removed);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let removed = self.store.delete_matching(&self.namespace.regex()).await?;
        warn!(
            "⚠ Document FLUSH removed {} entries under {}",
            removed,
            self.namespace.prefix()
        );
        Ok(())
    }

    async fn stats(&self) -> Stats {
        let mut stats = Stats::new();
        stats.insert("type".into(), Value::from("mongodb"));
        stats.insert("prefix".into(), Value::from(self.namespace.prefix()));
        stats.insert("serializer".into(), Value::from(self.codec.name()));
        stats.insert("hits".into(), Value::from(self.metrics.hits()));
        stats.insert("misses".into(), Value::from(self.metrics.misses()));

        let count = self
            .store
            .keys_matching(&self.namespace.regex(), now_ms())
            .try_fold(0usize, |n, _| async move { Ok(n + 1) })
            .await;
        match count {
            Ok(n) => {
                stats.insert("count".into(), Value::from(n));
            }
            Err(e) => {
                stats.insert("count".into(), Value::Int(0));
                stats.insert("error".into(), Value::from(e.to_string()));
            }
        }

        match self.store.info().await {
            Ok(info) => {
                stats.insert("info".into(), Value::from(info));
            }
            Err(e) => debug!("Document store info unavailable: {}", e),
        }
        stats
    }

    /// Idempotent: only the first call reaches the store, across every
    /// `with_serializer` sibling.
    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.store.close().await
    }

    fn with_serializer(&self, serializer: &str) -> Arc<dyn Driver> {
        Arc::new(DocumentDriver {
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
