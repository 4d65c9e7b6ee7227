//! Named driver registry with a default driver.
//!
//! The manager owns no cache data. Every cache operation resolves the
//! current default driver and forwards to it; driver operations are not
//! serialized by the manager.
//!
//! ```
//! use cache_facade::config::MemoryDriverConfig;
//! use cache_facade::driver::MemoryDriver;
//! use cache_facade::{Manager, Value};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> cache_facade::Result<()> {
//!     let manager = Manager::new();
//!     let config = MemoryDriverConfig { enabled: true, ..Default::default() };
//!     manager.add_driver("memory", Arc::new(MemoryDriver::new(&config)?));
//!
//!     manager.set("answer", Value::from(42), Duration::ZERO).await?;
//!     assert_eq!(manager.get("answer").await, Some(Value::from(42)));
//!     Ok(())
//! }
//! ```

use crate::driver::{compute, dedup_keys, Driver, Stats};
use crate::error::{Error, Result};
use crate::value::Value;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Registry {
    drivers: HashMap<String, Arc<dyn Driver>>,
    default: Option<String>,
}

/// Registry of named drivers.
///
/// Registration and lookups take a `parking_lot::RwLock`; the lock is
/// released before any driver call is awaited.
#[derive(Default)]
pub struct Manager {
    registry: RwLock<Registry>,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a driver. The first driver registered while no
    /// default is set becomes the default.
    pub fn add_driver(&self, name: impl Into<String>, driver: Arc<dyn Driver>) {
        let name = name.into();
        let mut registry = self.registry.write();
        if registry.default.is_none() {
            registry.default = Some(name.clone());
        }
        info!("✓ Cache driver registered: {} ({})", name, driver.codec());
        registry.drivers.insert(name, driver);
    }

    /// Set the default driver name. The name is not validated: operations
    /// behave as if no default were set until a driver of that name is added.
    pub fn set_default_driver(&self, name: impl Into<String>) {
        let name = name.into();
        let mut registry = self.registry.write();
        if !registry.drivers.contains_key(&name) {
            debug!("Default cache driver '{}' is not registered yet", name);
        }
        registry.default = Some(name);
    }

    /// Name of the default driver, if one was set.
    pub fn default_driver_name(&self) -> Option<String> {
        self.registry.read().default.clone()
    }

    /// Names of all registered drivers, sorted.
    pub fn driver_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().drivers.keys().cloned().collect();
        names.sort();
        names
    }

    /// The driver registered under `name` (the same instance, not a copy).
    ///
    /// # Errors
    /// Returns `Error::DriverNotFound` if `name` is not registered
    pub fn driver(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.registry
            .read()
            .drivers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::DriverNotFound(name.to_string()))
    }

    fn default_driver(&self) -> Option<Arc<dyn Driver>> {
        let registry = self.registry.read();
        let name = registry.default.as_ref()?;
        registry.drivers.get(name).cloned()
    }

    fn require_default(&self) -> Result<Arc<dyn Driver>> {
        self.default_driver().ok_or(Error::NoDefaultDriver)
    }

    /// Read from the default driver. `None` when there is no usable default.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.default_driver()?.get(key).await
    }

    /// `false` when there is no usable default.
    pub async fn has(&self, key: &str) -> bool {
        match self.default_driver() {
            Some(driver) => driver.has(key).await,
            None => false,
        }
    }

    /// # Errors
    /// `Error::NoDefaultDriver`, or the driver's error
    pub async fn set(&self, key: &str, value: impl Into<Value>, ttl: Duration) -> Result<()> {
        self.require_default()?.set(key, &value.into(), ttl).await
    }

    /// # Errors
    /// `Error::NoDefaultDriver`, or the driver's error
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.require_default()?.delete(key).await
    }

    /// # Errors
    /// `Error::NoDefaultDriver`, or the driver's error
    pub async fn flush(&self) -> Result<()> {
        self.require_default()?.flush().await
    }

    /// Batch read from the default driver. Without a usable default every
    /// requested key is reported missing.
    pub async fn get_multiple(&self, keys: &[&str]) -> (HashMap<String, Value>, Vec<String>) {
        match self.default_driver() {
            Some(driver) => driver.get_multiple(keys).await,
            None => (
                HashMap::new(),
                dedup_keys(keys).into_iter().map(str::to_string).collect(),
            ),
        }
    }

    /// # Errors
    /// `Error::NoDefaultDriver`, or the driver's error
    pub async fn set_multiple(&self, values: &HashMap<String, Value>, ttl: Duration) -> Result<()> {
        self.require_default()?.set_multiple(values, ttl).await
    }

    /// # Errors
    /// `Error::NoDefaultDriver`, or the driver's error
    pub async fn delete_multiple(&self, keys: &[&str]) -> Result<()> {
        self.require_default()?.delete_multiple(keys).await
    }

    /// Cache-aside through the default driver (see [`Driver::remember`]).
    ///
    /// # Errors
    /// `Error::NoDefaultDriver`, or the error returned by `f`
    pub async fn remember<F, Fut>(&self, key: &str, ttl: Duration, f: F) -> Result<Value>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Value>> + Send,
    {
        let driver = self.require_default()?;
        driver.remember(key, ttl, compute(f)).await
    }

    /// Stats of every registered driver, by name.
    pub async fn stats(&self) -> HashMap<String, Stats> {
        let drivers = self.snapshot();
        let mut all = HashMap::with_capacity(drivers.len());
        for (name, driver) in drivers {
            let stats = driver.stats().await;
            all.insert(name, stats);
        }
        all
    }

    /// Close every registered driver, continuing past failures.
    ///
    /// # Errors
    /// `Error::CloseFailed` listing each driver that failed
    pub async fn close(&self) -> Result<()> {
        let mut failures = Vec::new();
        for (name, driver) in self.snapshot() {
            if let Err(e) = driver.close().await {
                warn!("⚠ Closing cache driver {} failed: {}", name, e);
                failures.push((name, e));
            }
        }

        if failures.is_empty() {
            info!("✓ All cache drivers closed");
            Ok(())
        } else {
            Err(Error::CloseFailed(failures))
        }
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Driver>)> {
        let mut drivers: Vec<_> = self
            .registry
            .read()
            .drivers
            .iter()
            .map(|(name, driver)| (name.clone(), Arc::clone(driver)))
            .collect();
        drivers.sort_by(|a, b| a.0.cmp(&b.0));
        drivers
    }
}
