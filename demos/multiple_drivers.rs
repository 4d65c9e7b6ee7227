//! Example demonstrating driver swapping behind one manager.

use cache_facade::{
    config::{CacheConfig, DriversConfig, FileDriverConfig, MemoryDriverConfig},
    error::Result,
    build_manager, Backends, Driver, Manager, Value,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Pretend database lookup.
async fn load_user(id: &str) -> Result<Value> {
    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut user = BTreeMap::new();
    user.insert("id".to_string(), Value::from(id));
    user.insert("name".to_string(), Value::from(format!("User {}", id)));
    user.insert("email".to_string(), Value::from(format!("user{}@example.com", id)));
    Ok(Value::Map(user))
}

/// Works the same with any driver.
async fn demonstrate_driver(driver: Arc<dyn Driver>, name: &str) -> Result<()> {
    println!("\n--- Using {} Driver ({}) ---", name, driver.codec());

    for request in 1..=2 {
        let started = std::time::Instant::now();
        let user = driver
            .remember(
                "user_001",
                Duration::from_secs(60),
                cache_facade::compute(|| load_user("001")),
            )
            .await?;
        println!(
            "Request {}: {} in {:?}",
            request,
            user.get("name").and_then(Value::as_str).unwrap_or("?"),
            started.elapsed()
        );
    }

    let stats = driver.stats().await;
    println!(
        "  ✓ count={:?} hits={:?} misses={:?}",
        stats.get("count"),
        stats.get("hits"),
        stats.get("misses")
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .ok();

    println!("\n=== Cache Facade - Multiple Drivers ===");

    let config = CacheConfig {
        default_driver: Some("memory".to_string()),
        drivers: DriversConfig {
            memory: Some(MemoryDriverConfig {
                enabled: true,
                default_ttl: 300,
                ..Default::default()
            }),
            file: Some(FileDriverConfig {
                enabled: true,
                path: std::env::temp_dir().join("cache-facade-demo"),
                serializer: "native".to_string(),
                ..Default::default()
            }),
            redis: None,
            mongodb: None,
        },
    };

    #[allow(unused_mut)]
    let mut backends = Backends::new();

    // Redis driver (if feature enabled)
    #[cfg(feature = "redis")]
    let config = {
        use cache_facade::backend::{RedisConfig, RedisExecutor};
        use cache_facade::config::RedisDriverConfig;

        let mut config = config;
        match RedisExecutor::new(RedisConfig::default()) {
            Ok(executor) => {
                backends = backends.with_redis(Arc::new(executor));
                config.drivers.redis = Some(RedisDriverConfig {
                    enabled: true,
                    serializer: "msgpack".to_string(),
                    ..Default::default()
                });
            }
            Err(e) => println!("\n✗ Redis executor unavailable: {}", e),
        }
        config
    };

    let manager: Manager = match build_manager(&config, backends).await {
        Ok(manager) => manager,
        Err(e) => {
            println!("\n✗ Bootstrap failed: {} (Make sure Redis is running)", e);
            return Err(e);
        }
    };

    for name in manager.driver_names() {
        demonstrate_driver(manager.driver(&name)?, &name).await?;
    }

    // Per-call serializer override leaves the registered driver untouched
    let packed = manager.driver("memory")?.with_serializer("msgpack");
    packed.set("packed", &Value::from("compact"), Duration::ZERO).await?;
    println!("\nmsgpack sibling read: {:?}", packed.get("packed").await);

    for name in manager.driver_names() {
        manager.driver(&name)?.flush().await?;
    }
    manager.close().await?;
    println!("\n✓ Done");
    Ok(())
}
