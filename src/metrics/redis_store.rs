//! Redis-backed metrics store.
//!
//! Shared by every proxy instance pointed at the same Redis. Counters use
//! INCR/DECR, sample lists LPUSH + LTRIM, discovery SCAN MATCH.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ConnectionInfo, IntoConnectionInfo};

use crate::config::schema::MetricsConfig;
use crate::metrics::store::{MetricsStore, StoreError};

const SCAN_BATCH: usize = 100;

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    retention: usize,
}

impl RedisStore {
    /// Connect and verify the store answers PING.
    pub async fn connect(config: &MetricsConfig) -> Result<Self, StoreError> {
        let info = connection_info(config)?;
        let client = redis::Client::open(info)?;
        let conn = ConnectionManager::new(client).await?;

        let store = Self {
            conn,
            retention: config.sample_retention.max(1),
        };
        store.ping().await?;

        tracing::info!(address = %config.redis_address, "Connected to redis metrics store");
        Ok(store)
    }
}

/// Build connection info from an address ("host:port" or a redis URL)
/// plus optional credentials.
pub fn connection_info(config: &MetricsConfig) -> Result<ConnectionInfo, StoreError> {
    let address = config.redis_address.trim();
    let url = if address.starts_with("redis://") || address.starts_with("rediss://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    };

    let mut info = url
        .as_str()
        .into_connection_info()
        .map_err(|e| StoreError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(user) = &config.redis_username {
        info.redis.username = Some(user.clone());
    }
    if let Some(password) = &config.redis_password {
        info.redis.password = Some(password.clone());
    }
    Ok(info)
}

#[async_trait]
impl MetricsStore for RedisStore {
    async fn increment_counter(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn increment_gauge(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, 1).await?;
        Ok(value)
    }

    async fn decrement_gauge(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.decr(key, 1).await?;
        Ok(value)
    }

    async fn push_sample(&self, key: &str, value: f64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let stop = self.retention as isize - 1;
        let _: () = redis::pipe()
            .lpush(key, value)
            .ignore()
            .ltrim(key, 0, stop)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn read_counter(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<i64> = conn.get(key).await?;
        Ok(value.unwrap_or(0))
    }

    async fn read_list(&self, key: &str) -> Result<Vec<f64>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Vec<String> = conn.lrange(key, 0, -1).await?;
        Ok(raw.iter().filter_map(|v| v.parse::<f64>().ok()).collect())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
