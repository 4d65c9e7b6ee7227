//! Driver configuration.
//!
//! These structs are what an external loader deserializes from the `cache`
//! section of application configuration. Every field has a default, so a
//! partial or empty section still loads; drivers decide at construction
//! whether the resulting settings are usable.
//!
//! ```
//! use cache_facade::config::CacheConfig;
//!
//! let config: CacheConfig = serde_json::from_str(r#"{
//!     "default_driver": "redis",
//!     "drivers": {
//!         "memory": { "enabled": true, "default_ttl": 60 },
//!         "redis":  { "enabled": true, "serializer": "msgpack" }
//!     }
//! }"#).unwrap();
//!
//! assert!(config.drivers.memory.unwrap().enabled);
//! assert!(config.drivers.file.is_none());
//! ```

use crate::key::DEFAULT_PREFIX;
use crate::scan::DEFAULT_SCAN_COUNT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level cache configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Driver to make default after registration. `None` keeps the first
    /// registered driver.
    pub default_driver: Option<String>,
    pub drivers: DriversConfig,
}

/// Per-driver sections. An absent section means the driver is not built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriversConfig {
    pub memory: Option<MemoryDriverConfig>,
    pub file: Option<FileDriverConfig>,
    pub redis: Option<RedisDriverConfig>,
    pub mongodb: Option<DocumentDriverConfig>,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

/// In-process driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryDriverConfig {
    pub enabled: bool,
    /// Seconds; `0` applies no expiration in `remember`.
    pub default_ttl: u64,
    pub serializer: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for MemoryDriverConfig {
    fn default() -> Self {
        MemoryDriverConfig {
            enabled: false,
            default_ttl: 0,
            serializer: String::new(),
            prefix: default_prefix(),
        }
    }
}

impl MemoryDriverConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

/// Filesystem driver settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDriverConfig {
    pub enabled: bool,
    /// Directory holding one file per entry. Created if missing.
    pub path: PathBuf,
    /// Seconds; `0` applies no expiration in `remember`.
    pub default_ttl: u64,
    pub serializer: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for FileDriverConfig {
    fn default() -> Self {
        FileDriverConfig {
            enabled: false,
            path: PathBuf::new(),
            default_ttl: 0,
            serializer: String::new(),
            prefix: default_prefix(),
        }
    }
}

impl FileDriverConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

/// Network key-value driver settings.
///
/// The connection itself is configured on the executor (see
/// `backend::RedisConfig`); this section only shapes how the driver uses it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisDriverConfig {
    pub enabled: bool,
    /// Seconds; `0` applies no expiration in `remember`.
    pub default_ttl: u64,
    pub serializer: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// Page-size hint for SCAN during flush and stats.
    pub scan_count: usize,
}

impl Default for RedisDriverConfig {
    fn default() -> Self {
        RedisDriverConfig {
            enabled: false,
            default_ttl: 0,
            serializer: String::new(),
            prefix: default_prefix(),
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }
}

impl RedisDriverConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}

/// Document-store driver settings.
///
/// The connection is configured on the store (see `backend::MongoConfig`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentDriverConfig {
    pub enabled: bool,
    /// Seconds; `0` applies no expiration in `remember`.
    pub default_ttl: u64,
    pub serializer: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for DocumentDriverConfig {
    fn default() -> Self {
        DocumentDriverConfig {
            enabled: false,
            default_ttl: 0,
            serializer: String::new(),
            prefix: default_prefix(),
        }
    }
}

impl DocumentDriverConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }
}
