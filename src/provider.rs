//! Startup wiring: build a [`Manager`] from configuration.
//!
//! Drivers are registered in a fixed order (memory, file, redis, mongodb),
//! so with no `default_driver` configured the first enabled one becomes the
//! default.
//! Any constructor failure aborts the bootstrap; no half-built manager is
//! returned.

use crate::backend::{CommandExecutor, DocumentStore};
use crate::config::CacheConfig;
use crate::driver::{DocumentDriver, RedisDriver};
use crate::error::Result;
use crate::manager::Manager;
use std::sync::Arc;

/// Backend handles the drivers need but do not own the configuration of.
#[derive(Clone, Default)]
pub struct Backends {
    /// Executor for the `redis` driver.
    pub redis: Option<Arc<dyn CommandExecutor>>,
    /// Store for the `mongodb` driver.
    pub document: Option<Arc<dyn DocumentStore>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_redis(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.redis = Some(executor);
        self
    }

    pub fn with_document(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.document = Some(store);
        self
    }
}

/// Build a manager with every enabled driver registered.
///
/// # Errors
/// The first driver constructor error (`Error::ConfigError` for a missing
/// backend handle or unusable settings, `Error::BackendError` for a failed
/// connectivity check).
pub async fn build_manager(config: &CacheConfig, backends: Backends) -> Result<Manager> {
    let manager = Manager::new();
    let drivers = &config.drivers;

    if let Some(memory) = drivers.memory.as_ref().filter(|c| c.enabled) {
        #[cfg(feature = "inmemory")]
        {
            let driver = crate::driver::MemoryDriver::new(memory)?;
            manager.add_driver("memory", Arc::new(driver));
        }
        #[cfg(not(feature = "inmemory"))]
        {
            let _ = memory;
            return Err(crate::error::Error::ConfigError(
                "memory driver requires the `inmemory` feature".to_string(),
            ));
        }
    }

    if let Some(file) = drivers.file.as_ref().filter(|c| c.enabled) {
        #[cfg(feature = "file")]
        {
            let driver = crate::driver::FileDriver::new(file).await?;
            manager.add_driver("file", Arc::new(driver));
        }
        #[cfg(not(feature = "file"))]
        {
            let _ = file;
            return Err(crate::error::Error::ConfigError(
                "file driver requires the `file` feature".to_string(),
            ));
        }
    }

    if let Some(redis) = drivers.redis.as_ref().filter(|c| c.enabled) {
        let driver = RedisDriver::connect(redis, backends.redis).await?;
        manager.add_driver("redis", Arc::new(driver));
    }

    if let Some(mongodb) = drivers.mongodb.as_ref().filter(|c| c.enabled) {
        let driver = DocumentDriver::connect(mongodb, backends.document).await?;
        manager.add_driver("mongodb", Arc::new(driver));
    }

    if let Some(name) = &config.default_driver {
        if manager.driver(name).is_err() {
            warn!("⚠ Configured default cache driver '{}' is not enabled", name);
        }
        manager.set_default_driver(name.clone());
    }

    info!(
        "✓ Cache manager ready (drivers: {:?}, default: {:?})",
        manager.driver_names(),
        manager.default_driver_name()
    );

    Ok(manager)
}
