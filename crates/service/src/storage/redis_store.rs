use std::{future::Future, time::Duration};

use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;

use crate::errors::ServiceError;

/// Redis-backed key-value store.
///
/// One Redis key per entry; the value is the entry's JSON text. Every command
/// is a single round-trip bounded by `op_timeout`. With an empty `prefix` the
/// whole database is the keyspace, including keys written by other clients.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    addr: String,
    prefix: String,
    op_timeout: Duration,
}

impl RedisStore {
    /// Connect and PING once. Any failure, including `connect_timeout`
    /// elapsing, is returned; the caller decides whether to fall back.
    pub async fn connect(
        url: &str,
        prefix: impl Into<String>,
        connect_timeout: Duration,
        op_timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = redis::Client::open(url)?;

        // single-shot probe; the connection manager below retries with backoff
        let mut probe = within(connect_timeout, client.get_multiplexed_tokio_connection()).await?;
        let pong: String = within(connect_timeout, redis::cmd("PING").query_async(&mut probe)).await?;
        if pong != "PONG" {
            return Err(ServiceError::Backend(format!("unexpected PING reply: {pong}")));
        }

        let conn = within(connect_timeout, ConnectionManager::new(client)).await?;
        debug!(addr = %url, "redis connection established");
        Ok(Self { conn, addr: url.to_string(), prefix: prefix.into(), op_timeout })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn pattern(&self) -> String {
        format!("{}*", escape_glob(&self.prefix))
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, ServiceError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = within(self.op_timeout, conn.get(self.scoped(key))).await?;
        raw.map(|s| serde_json::from_str(&s)).transpose().map_err(Into::into)
    }

    pub async fn set(&self, key: &str, value: &Value) -> Result<(), ServiceError> {
        let payload = serde_json::to_string(value)?;
        let mut conn = self.conn.clone();
        within(self.op_timeout, conn.set::<_, _, ()>(self.scoped(key), payload)).await
    }

    /// Raw bytes, so a foreign key that is not UTF-8 cannot fail the whole listing.
    async fn raw_keys(&self) -> Result<Vec<Vec<u8>>, ServiceError> {
        let mut conn = self.conn.clone();
        within(self.op_timeout, conn.keys(self.pattern())).await
    }

    pub async fn keys(&self) -> Result<Vec<String>, ServiceError> {
        Ok(unscoped_keys(&self.prefix, self.raw_keys().await?))
    }

    pub async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let mut conn = self.conn.clone();
        let removed: i64 = within(self.op_timeout, conn.del(self.scoped(key))).await?;
        Ok(removed > 0)
    }

    /// FLUSHDB without a prefix; otherwise delete only the prefixed keys.
    pub async fn clear(&self) -> Result<(), ServiceError> {
        let mut conn = self.conn.clone();
        if self.prefix.is_empty() {
            return within(self.op_timeout, redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn)).await;
        }
        let keys = self.raw_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        within(self.op_timeout, conn.del::<_, ()>(keys)).await
    }
}

async fn within<T, F>(limit: Duration, fut: F) -> Result<T, ServiceError>
where
    F: Future<Output = RedisResult<T>>,
{
    match timeout(limit, fut).await {
        Ok(res) => res.map_err(Into::into),
        Err(_) => Err(ServiceError::Timeout(limit)),
    }
}

/// Strip `prefix` from each key; keys that are not UTF-8 or lack the prefix are skipped.
fn unscoped_keys(prefix: &str, raw: Vec<Vec<u8>>) -> Vec<String> {
    raw.into_iter()
        .filter_map(|bytes| match String::from_utf8(bytes) {
            Ok(key) => key.strip_prefix(prefix).map(str::to_string),
            Err(e) => {
                debug!(key = %String::from_utf8_lossy(e.as_bytes()), "skipping non-utf8 key");
                None
            }
        })
        .collect()
}

/// Escape Redis glob metacharacters so a prefix matches literally.
fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
