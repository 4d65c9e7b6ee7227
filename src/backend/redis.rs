//! Redis command executor over a deadpool connection pool.

use super::{CommandExecutor, ScanPage};
use crate::error::{Error, Result};
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Formula: (CPU cores × 2) + 1
/// For 8-core systems: 16 connections is optimal
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

/// Configuration for the Redis connection pool.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        if let Some(password) = &self.password {
            if let Some(username) = &self.username {
                format!(
                    "redis://{}:{}@{}:{}/{}",
                    username, password, self.host, self.port, self.database
                )
            } else {
                format!(
                    "redis://default:{}@{}:{}/{}",
                    password, self.host, self.port, self.database
                )
            }
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }
}

/// Redis executor with connection pooling.
///
/// Creating the executor does not open a connection; drivers check it with
/// `ping` at construction time.
///
/// # Example
///
/// ```no_run
/// # use cache_facade::backend::{RedisConfig, RedisExecutor, CommandExecutor};
/// # use cache_facade::error::Result;
/// # async fn example() -> Result<()> {
/// let executor = RedisExecutor::new(RedisConfig::default())?;
/// executor.ping().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisExecutor {
    pool: Pool,
}

impl RedisExecutor {
    /// Create a pooled executor from configuration.
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be built from the
    /// configured URL.
    pub fn new(config: RedisConfig) -> Result<Self> {
        let pool = Self::build_pool(
            &config.connection_string(),
            config.pool_size,
            Some(config.connection_timeout),
        )?;

        info!(
            "✓ Redis executor initialized: {}:{} (db {})",
            config.host, config.port, config.database
        );

        Ok(RedisExecutor { pool })
    }

    /// Create from connection string directly.
    ///
    /// Pool size is determined by:
    /// 1. `REDIS_POOL_SIZE` environment variable (if set)
    /// 2. `DEFAULT_POOL_SIZE` constant (16)
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the pool cannot be built.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let pool = Self::build_pool(conn_str, pool_size, None)?;

        info!(
            "✓ Redis executor initialized from connection string (pool size: {})",
            pool_size
        );

        Ok(RedisExecutor { pool })
    }

    fn build_pool(url: &str, pool_size: u32, timeout: Option<Duration>) -> Result<Pool> {
        let mut cfg = PoolConfig::from_url(url);
        let mut pool_cfg = deadpool_redis::PoolConfig::new(pool_size as usize);
        pool_cfg.timeouts.wait = timeout;
        pool_cfg.timeouts.create = timeout;
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::BackendError(format!("Failed to get Redis connection: {}", e)))
    }
}

/// `SET key value [PX ms]` for one entry.
fn set_command(key: &str, value: &[u8], ttl: Duration) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key).arg(value);
    if !ttl.is_zero() {
        // sub-millisecond TTLs round up so they still expire
        cmd.arg("PX").arg(ttl.as_millis().max(1) as u64);
    }
    cmd
}

#[async_trait]
impl CommandExecutor for RedisExecutor {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;

        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| Error::BackendError(format!("Redis GET failed for key {}: {}", key, e)))?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;

        set_command(key, &value, ttl)
            .query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis SET failed for key {}: {}", key, e)))?;

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;

        let exists: bool = conn.exists(key).await.map_err(|e| {
            Error::BackendError(format!("Redis EXISTS failed for key {}: {}", key, e))
        })?;

        Ok(exists)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;

        let removed: u64 = conn
            .del(keys)
            .await
            .map_err(|e| Error::BackendError(format!("Redis DEL failed: {}", e)))?;

        Ok(removed)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;

        // explicit MGET: a one-element slice through `get` would issue GET
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis MGET failed: {}", e)))?;

        Ok(values)
    }

    async fn mset(&self, entries: Vec<(String, Vec<u8>)>, ttl: Duration) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;

        // Plain (non-MULTI) pipeline: entries are independent, and a failure
        // part-way leaves earlier entries written.
        let mut pipe = redis::pipe();
        for (key, value) in &entries {
            pipe.add_command(set_command(key, value, ttl)).ignore();
        }
        pipe.query_async::<()>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis pipelined SET failed: {}", e)))?;

        Ok(())
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage> {
        let mut conn = self.conn().await?;

        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis SCAN failed: {}", e)))?;

        Ok(ScanPage { cursor, keys })
    }

    async fn info(&self) -> Result<String> {
        let mut conn = self.conn().await?;

        redis::cmd("INFO")
            .query_async::<String>(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis INFO failed: {}", e)))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::BackendError(format!("Redis PING failed: {}", e)))?;

        if pong.contains("PONG") {
            Ok(())
        } else {
            Err(Error::BackendError(format!(
                "Unexpected PING reply: {}",
                pong
            )))
        }
    }

    async fn close(&self) -> Result<()> {
        if !self.pool.is_closed() {
            self.pool.close();
            info!("✓ Redis connection pool closed");
        }
        Ok(())
    }
}
