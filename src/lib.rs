//! # cache-facade
//!
//! One caching API over interchangeable backends.
//!
//! ## Features
//!
//! - **Backend Agnostic:** In-process, filesystem, Redis and MongoDB drivers behind one [`Driver`] trait
//! - **Named Registry:** A [`Manager`] holds drivers by name and routes to a default
//! - **Pluggable Codecs:** JSON, MessagePack or a native binary format, chosen by name
//! - **Cache-Aside:** [`Driver::remember`] computes and stores on a miss
//! - **Namespaced:** Flush and stats only touch keys under the driver's prefix
//! - **Production Ready:** Built-in logging, hit/miss counters, and error handling
//!
//! ## Quick Start
//!
//! ```
//! use cache_facade::config::CacheConfig;
//! use cache_facade::{build_manager, Backends, Value};
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> cache_facade::Result<()> {
//!     let config: CacheConfig = serde_json::from_str(r#"{
//!         "drivers": { "memory": { "enabled": true, "default_ttl": 300 } }
//!     }"#).unwrap();
//!
//!     let cache = build_manager(&config, Backends::new()).await?;
//!
//!     let user = cache
//!         .remember("user:42", Duration::ZERO, || async {
//!             // expensive lookup
//!             Ok(Value::from("alice"))
//!         })
//!         .await?;
//!     assert_eq!(user, Value::from("alice"));
//!     Ok(())
//! }
//! ```
//!
//! ### Redis
//!
//! With the `redis` feature, hand a [`backend::RedisExecutor`] (or any other
//! [`backend::CommandExecutor`]) to the bootstrap:
//!
//! ```ignore
//! use cache_facade::backend::{RedisConfig, RedisExecutor};
//! use std::sync::Arc;
//!
//! let executor = Arc::new(RedisExecutor::new(RedisConfig::default())?);
//! let cache = build_manager(&config, Backends::new().with_redis(executor)).await?;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod config;
pub mod driver;
pub mod error;
pub mod key;
pub mod manager;
pub mod observability;
pub mod provider;
pub mod scan;
pub mod serialization;
pub mod value;

// Re-exports for convenience
pub use backend::{CommandExecutor, DocumentStore};
pub use driver::{compute, Driver, Stats};
pub use error::{Error, Result};
pub use manager::Manager;
pub use provider::{build_manager, Backends};
pub use serialization::Codec;
pub use value::Value;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
