//! Filesystem driver.
//!
//! One file per entry. The file name is the 128-bit xxh3 hash of the
//! namespaced key, sharded into a sub-directory named by its first two hex
//! digits, so key length never reaches the filesystem's name limit. Each
//! body is a postcard [`FileRecord`] carrying the namespaced key itself;
//! flush and stats read it back to stay scoped to the namespace.
//!
//! Writes go to a temporary file first and are renamed into place, so a
//! reader sees either the old entry or the new one.

use super::{dedup_keys, Driver, Stats};
use crate::config::FileDriverConfig;
use crate::error::{Error, Result};
use crate::key::KeyNamespace;
use crate::observability::DriverMetrics;
use crate::serialization::Codec;
use crate::value::Value;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use xxhash_rust::xxh3::xxh3_128;

const EXTENSION: &str = "cache";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk entry.
#[derive(Debug, Serialize, Deserialize)]
struct FileRecord {
    /// Namespaced key, as written.
    key: String,
    /// Unix epoch milliseconds; `None` never expires.
    expires_at_ms: Option<u64>,
    payload: Vec<u8>,
}

impl FileRecord {
    fn new(key: String, payload: Vec<u8>, ttl: Duration) -> Self {
        let expires_at_ms = (!ttl.is_zero())
            .then(|| now_ms().saturating_add(ttl.as_millis().min(u64::MAX as u128) as u64));
        FileRecord {
            key,
            expires_at_ms,
            payload,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at_ms.is_some_and(|exp| now_ms() >= exp)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn invalid_record(e: postcard::Error) -> Error {
    Error::InvalidCacheEntry(format!("file record: {}", e))
}

fn is_entry_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == EXTENSION)
}

/// Driver storing entries as files under one directory.
#[derive(Clone)]
pub struct FileDriver {
    dir: Arc<PathBuf>,
    namespace: KeyNamespace,
    codec: Codec,
    default_ttl: Duration,
    metrics: Arc<DriverMetrics>,
}

impl FileDriver {
    /// Create the driver, creating its directory if needed.
    ///
    /// # Errors
    /// - `Error::ConfigError` if the driver is disabled or `path` is empty
    /// - `Error::BackendError` if the directory cannot be created
    pub async fn new(config: &FileDriverConfig) -> Result<Self> {
        if !config.enabled {
            return Err(Error::ConfigError("file driver is not enabled".to_string()));
        }
        if config.path.as_os_str().is_empty() {
            return Err(Error::ConfigError(
                "file driver requires a cache directory path".to_string(),
            ));
        }

        fs::create_dir_all(&config.path).await?;

        let driver = FileDriver {
            dir: Arc::new(config.path.clone()),
            namespace: KeyNamespace::new(config.prefix.clone()),
            codec: Codec::from_name(&config.serializer),
            default_ttl: config.default_ttl(),
            metrics: Arc::new(DriverMetrics::new()),
        };

        info!(
            "✓ File driver ready at {:?} (serializer: {}, default TTL: {:?})",
            driver.dir, driver.codec, driver.default_ttl
        );
        Ok(driver)
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<first two hex digits>/<32 hex digits>.cache`
    fn entry_path(&self, key: &str) -> PathBuf {
        let hash = format!("{:032x}", xxh3_128(self.namespace.qualify(key).as_bytes()));
        self.dir
            .join(&hash[0..2])
            .join(format!("{}.{}", hash, EXTENSION))
    }

    /// Live record at `path`. Expired records are removed and read as absent.
    async fn read_record(&self, path: &Path) -> Result<Option<FileRecord>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: FileRecord = postcard::from_bytes(&bytes).map_err(invalid_record)?;
        if record.is_expired() {
            remove_quietly(path).await;
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Record for a logical key. A record holding another key (a hash
    /// collision or a misplaced file) reads as absent.
    async fn read_entry(&self, key: &str) -> Result<Option<FileRecord>> {
        let full = self.namespace.qualify(key);
        Ok(self
            .read_record(&self.entry_path(key))
            .await?
            .filter(|record| record.key == full))
    }

    async fn write_record(&self, path: &Path, record: &FileRecord) -> Result<()> {
        let bytes = postcard::to_allocvec(record)
            .map_err(|e| Error::SerializationError(e.to_string()))?;

        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard).await?;
        }

        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("{}.tmp", n));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, path).await {
            remove_quietly(&temp_path).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> Option<Value> {
        match self.read_entry(key).await {
            Ok(Some(record)) => match self.codec.decode(&record.payload) {
                Ok(value) => {
                    self.metrics.record_hit(key);
                    Some(value)
                }
                Err(e) => {
                    self.metrics.record_error(key, &e.to_string());
                    None
                }
            },
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

    fn record(&self, key: &str, value: &Value, ttl: Duration) -> Result<(PathBuf, FileRecord)> {
        let payload = self.codec.encode(value)?;
        Ok((
            self.entry_path(key),
            FileRecord::new(self.namespace.qualify(key), payload, ttl),
        ))
    }

    /// Live entry files whose record belongs to this driver's namespace.
    /// Unreadable files are skipped.
    async fn entries(&self) -> Result<Vec<PathBuf>> {
        let mut shards = fs::read_dir(self.dir.as_path()).await?;
        let mut paths = Vec::new();
        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(file) = files.next_entry().await? {
                let path = file.path();
                if !is_entry_file(&path) {
                    continue;
                }
                match self.read_record(&path).await {
                    Ok(Some(record)) if self.namespace.strip(&record.key).is_some() => {
                        paths.push(path)
                    }
                    Ok(_) => {}
                    Err(e) => debug!("Skipping unreadable cache file {:?}: {}", path, e),
                }
            }
        }
        Ok(paths)
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            debug!("Could not remove {:?}: {}", path, e);
        }
    }
}

async fn remove(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Driver for FileDriver {
    async fn get(&self, key: &str) -> Option<Value> {
        self.read(key).await
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<()> {
        let (path, record) = self.record(key, value, ttl)?;
        self.write_record(&path, &record).await?;

        debug!("✓ File SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn has(&self, key: &str) -> bool {
        match self.read_entry(key).await {
            Ok(record) => record.is_some(),
            Err(e) => {
                warn!("File HAS {} failed (treated as absent): {}", key, e);
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        remove(&self.entry_path(key)).await?;
        debug!("✓ File DELETE {}", key);
        Ok(())
    }

    async fn get_multiple(&self, keys: &[&str]) -> (HashMap<String, Value>, Vec<String>) {
        let mut found = HashMap::new();
        let mut missing = Vec::new();
        for key in dedup_keys(keys) {
            match self.read(key).await {
                Some(v) => {
                    found.insert(key.to_string(), v);
                }
                None => missing.push(key.to_string()),
            }
        }
        (found, missing)
    }

    /// Encodes everything first, then writes file by file. An I/O failure
    /// part-way leaves the files already renamed into place.
    async fn set_multiple(&self, values: &HashMap<String, Value>, ttl: Duration) -> Result<()> {
        let mut records = Vec::with_capacity(values.len());
        for (key, value) in values {
            records.push(self.record(key, value, ttl)?);
        }
        for (path, record) in &records {
            self.write_record(path, record).await?;
        }

        debug!("✓ File SET_MULTIPLE {} keys", records.len());
        Ok(())
    }

    async fn delete_multiple(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            remove(&self.entry_path(key)).await?;
        }
        debug!("✓ File DELETE_MULTIPLE {} keys", keys.len());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        let paths = self.entries().await?;
        for path in &paths {
            remove(path).await?;
        }
        warn!(
            "⚠ File FLUSH removed {} entries under {}",
            paths.len(),
            self.namespace.prefix()
        );
        Ok(())
    }

    async fn stats(&self) -> Stats {
        let mut stats = Stats::new();
        stats.insert("type".into(), Value::from("file"));
        stats.insert("prefix".into(), Value::from(self.namespace.prefix()));
        stats.insert("serializer".into(), Value::from(self.codec.name()));
        stats.insert("path".into(), Value::from(self.dir.display().to_string()));
        stats.insert("hits".into(), Value::from(self.metrics.hits()));
        stats.insert("misses".into(), Value::from(self.metrics.misses()));

        let count = match self.entries().await {
            Ok(paths) => paths.len(),
            Err(e) => {
                stats.insert("error".into(), Value::from(e.to_string()));
                0
            }
        };
        stats.insert("count".into(), Value::from(count));
        stats
    }

    /// Nothing to release; entries stay on disk.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn with_serializer(&self, serializer: &str) -> Arc<dyn Driver> {
        Arc::new(FileDriver {
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

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn driver(dir: &TempDir) -> FileDriver {
        FileDriver::new(&FileDriverConfig {
            enabled: true,
            path: dir.path().join("entries"),
            ..Default::default()
        })
        .await
        .expect("file driver")
    }

    #[tokio::test]
    async fn test_constructor_errors() {
        let disabled = FileDriver::new(&FileDriverConfig::default()).await;
        assert!(matches!(disabled, Err(Error::ConfigError(_))));

        let no_path = FileDriver::new(&FileDriverConfig {
            enabled: true,
            ..Default::default()
        })
        .await;
        assert!(matches!(no_path, Err(Error::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_creates_directory() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;
        assert!(driver.path().is_dir());
    }

    #[tokio::test]
    async fn test_set_get_has_delete() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;

        driver
            .set("user:1", &Value::from("alice"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(driver.get("user:1").await, Some(Value::from("alice")));
        assert!(driver.has("user:1").await);

        driver.delete("user:1").await.unwrap();
        assert!(!driver.has("user:1").await);
        driver.delete("user:1").await.unwrap();
    }

    #[tokio::test]
    async fn test_entry_path_is_sharded_hash() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;

        let path = driver.entry_path("a/b:c");
        let name = path.file_stem().unwrap().to_str().unwrap();
        let shard = path.parent().unwrap().file_name().unwrap().to_str().unwrap();
        assert_eq!(path.extension().unwrap(), "cache");
        assert_eq!(name.len(), 32);
        assert_eq!(shard, &name[0..2]);
        assert_eq!(path.parent().unwrap().parent().unwrap(), driver.path());
    }

    #[tokio::test]
    async fn test_long_keys_are_stored() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;
        let key = "k".repeat(300);

        driver
            .set(&key, &Value::from("long"), Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(driver.get(&key).await, Some(Value::from("long")));
        assert!(driver.has(&key).await);
        assert_eq!(driver.stats().await.get("count"), Some(&Value::Int(1)));

        driver.flush().await.unwrap();
        assert!(!driver.has(&key).await);
    }

    #[tokio::test]
    async fn test_record_for_other_key_is_miss() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;
        driver.set("a", &Value::from(1), Duration::ZERO).await.unwrap();

        let target = driver.entry_path("b");
        std::fs::create_dir_all(target.parent().unwrap()).unwrap();
        std::fs::copy(driver.entry_path("a"), &target).unwrap();

        assert_eq!(driver.get("b").await, None);
        assert!(!driver.has("b").await);
    }

    #[tokio::test]
    async fn test_expired_entry_is_miss_and_removed() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;

        driver
            .set("k", &Value::from(1), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(driver.get("k").await, None);
        assert!(!driver.entry_path("k").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_miss() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;

        let path = driver.entry_path("bad");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not a record").unwrap();
        assert_eq!(driver.get("bad").await, None);
        assert!(!driver.has("bad").await);
        assert_eq!(driver.stats().await.get("count"), Some(&Value::Int(0)));
    }

    #[tokio::test]
    async fn test_flush_keeps_other_namespaces() {
        let dir = TempDir::new().unwrap();
        let ours = driver(&dir).await;
        let theirs = FileDriver::new(&FileDriverConfig {
            enabled: true,
            path: dir.path().join("entries"),
            prefix: "other:".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

        ours.set("a", &Value::from(1), Duration::ZERO).await.unwrap();
        ours.set("b", &Value::from(2), Duration::ZERO).await.unwrap();
        theirs.set("a", &Value::from(3), Duration::ZERO).await.unwrap();

        ours.flush().await.unwrap();

        assert_eq!(ours.stats().await.get("count"), Some(&Value::Int(0)));
        assert_eq!(theirs.get("a").await, Some(Value::from(3)));
    }

    #[tokio::test]
    async fn test_stats_fields() {
        let dir = TempDir::new().unwrap();
        let driver = driver(&dir).await;
        driver.set("a", &Value::from(1), Duration::ZERO).await.unwrap();
        driver.get("a").await;
        driver.get("nope").await;

        let stats = driver.stats().await;
        assert_eq!(stats.get("type"), Some(&Value::from("file")));
        assert_eq!(stats.get("prefix"), Some(&Value::from("cache:")));
        assert_eq!(stats.get("count"), Some(&Value::Int(1)));
        assert_eq!(stats.get("hits"), Some(&Value::Int(1)));
        assert_eq!(stats.get("misses"), Some(&Value::Int(1)));
        assert!(stats.contains_key("path"));
    }
}
