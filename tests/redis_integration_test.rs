//! Redis Driver Integration Tests
//!
//! These tests require a running Redis instance.
//!
//! ## Quick Start
//!
//! ```bash
//! make up
//! cargo test --features redis --test redis_integration_test
//! ```
//!
//! ## Environment Variables
//!
//! - `TEST_REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
//!
//! ## What's Tested
//!
//! 1. Connection check and stats
//! 2. Basic set/get/delete and TTL expiration
//! 3. Batch operations (MGET / pipelined SET / DEL)
//! 4. Namespaced flush leaves foreign keys alone
//! 5. Concurrent access through the pool

#![cfg(feature = "redis")]

use cache_facade::backend::{CommandExecutor, RedisExecutor};
use cache_facade::config::RedisDriverConfig;
use cache_facade::driver::{Driver, RedisDriver};
use cache_facade::Value;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Helper: Get Redis connection URL from environment or use default
fn get_redis_url() -> String {
    env::var("TEST_REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Helper: a prefix no other test run shares
fn unique_prefix(test: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("it:{}:{}:", test, nanos)
}

/// Helper: connect a driver, or `None` when no server answers
async fn connect(test: &str) -> Option<(Arc<RedisExecutor>, RedisDriver)> {
    let executor = match RedisExecutor::from_connection_string(&get_redis_url()) {
        Ok(executor) => Arc::new(executor),
        Err(_) => return None,
    };
    let config = RedisDriverConfig {
        enabled: true,
        prefix: unique_prefix(test),
        scan_count: 10,
        ..Default::default()
    };
    match RedisDriver::connect(&config, Some(executor.clone() as Arc<dyn CommandExecutor>)).await {
        Ok(driver) => Some((executor, driver)),
        Err(e) => {
            println!("⚠️  Redis not available ({}), skipping test", e);
            None
        }
    }
}

#[tokio::test]
async fn test_redis_connection_and_stats() {
    let Some((_executor, driver)) = connect("stats").await else {
        return;
    };

    driver.set("a", &Value::from(1), Duration::ZERO).await.unwrap();
    let stats = driver.stats().await;

    assert_eq!(stats["type"], Value::from("redis"));
    assert_eq!(stats["count"], Value::Int(1));
    assert!(stats["info"].as_str().unwrap().contains("redis_version"));

    driver.flush().await.unwrap();
}

#[tokio::test]
async fn test_redis_basic_operations() {
    let Some((_executor, driver)) = connect("basic").await else {
        return;
    };

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
async fn test_redis_ttl_expiration() {
    let Some((_executor, driver)) = connect("ttl").await else {
        return;
    };

    driver
        .set("short", &Value::from("x"), Duration::from_millis(200))
        .await
        .unwrap();
    assert!(driver.has("short").await);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(driver.get("short").await, None);
}

#[tokio::test]
async fn test_redis_batch_operations() {
    let Some((_executor, driver)) = connect("batch").await else {
        return;
    };

    let mut values = HashMap::new();
    for i in 0..20 {
        values.insert(format!("k{}", i), Value::from(i));
    }
    driver.set_multiple(&values, Duration::from_secs(60)).await.unwrap();

    let (found, missing) = driver.get_multiple(&["k1", "k2", "nope"]).await;
    assert_eq!(found.len(), 2);
    assert_eq!(missing, vec!["nope".to_string()]);

    driver.delete_multiple(&["k1", "k2"]).await.unwrap();
    assert!(!driver.has("k1").await);

    driver.flush().await.unwrap();
    assert_eq!(driver.stats().await["count"], Value::Int(0));
}

#[tokio::test]
async fn test_redis_flush_is_namespaced() {
    let Some((executor, ours)) = connect("flush-ours").await else {
        return;
    };
    let Some((_, theirs)) = connect("flush-theirs").await else {
        return;
    };

    for i in 0..35 {
        ours.set(&format!("k{}", i), &Value::from(i), Duration::ZERO)
            .await
            .unwrap();
    }
    theirs.set("keep", &Value::from(true), Duration::ZERO).await.unwrap();

    ours.flush().await.unwrap();

    assert_eq!(ours.stats().await["count"], Value::Int(0));
    assert_eq!(theirs.get("keep").await, Some(Value::from(true)));

    theirs.flush().await.unwrap();
    executor.close().await.unwrap();
}

#[tokio::test]
async fn test_redis_concurrent_access() {
    let Some((_executor, driver)) = connect("concurrent").await else {
        return;
    };
    let driver = Arc::new(driver);

    let mut handles = Vec::new();
    for i in 0..10 {
        let d = Arc::clone(&driver);
        handles.push(tokio::spawn(async move {
            let key = format!("task{}", i);
            d.set(&key, &Value::from(i), Duration::ZERO).await.unwrap();
            assert_eq!(d.get(&key).await, Some(Value::from(i)));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(driver.stats().await["count"], Value::Int(10));
    driver.flush().await.unwrap();
}
