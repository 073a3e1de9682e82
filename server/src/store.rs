//! Shared state store port and its Redis implementation.
//!
//! Every cross-process mutation goes through an atomic primitive: the lease
//! compare-and-set and the wager append/remove are Lua scripts, the RTP
//! counters use `HINCRBYFLOAT`/`HINCRBY`. Local locks are never used; they do
//! not span instances.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("corrupt value at {key}: {source}")]
    Corrupt {
        key: String,
        source: serde_json::Error,
    },
}

/// Access to the shared state store.
///
/// Implementations must make each method atomic on its own; callers never
/// compose them under a lock.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set_string(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lease compare-and-set: extend when already held by `holder`, claim
    /// when unheld, fail when held by someone else. True iff `holder` holds
    /// the lease after the call.
    async fn acquire_or_extend_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Append a wager to the player's list inside the round hash. The list
    /// value is a JSON array; the append is a read-modify-write executed
    /// atomically inside the store.
    async fn wager_append(
        &self,
        key: &str,
        player_id: &str,
        wager_json: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Remove the wager with `transaction_id` from the player's list,
    /// deleting the player's field when the list empties. Returns the removed
    /// wager's JSON, or None when no such transaction exists.
    async fn wager_remove(
        &self,
        key: &str,
        player_id: &str,
        transaction_id: &str,
    ) -> Result<Option<String>, StoreError>;

    /// All fields of the round's wager hash: (player id, JSON wager list).
    async fn wager_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn hash_incr_float(&self, key: &str, field: &str, by: f64) -> Result<(), StoreError>;

    async fn hash_incr_int(&self, key: &str, field: &str, by: i64) -> Result<(), StoreError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
}

/// Read a JSON blob from the store.
pub async fn read_json<T: DeserializeOwned>(
    store: &dyn StateStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get_string(key).await? {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            }),
    }
}

/// Write a JSON blob to the store.
pub async fn write_json<T: Serialize>(
    store: &dyn StateStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })?;
    store.set_string(key, &raw, ttl).await
}

const LEASE_SCRIPT: &str = r#"
local holder = redis.call('GET', KEYS[1])
if holder == ARGV[1] then
  redis.call('PEXPIRE', KEYS[1], ARGV[2])
  return 1
elseif holder then
  return 0
else
  redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
  return 1
end
"#;

const WAGER_APPEND_SCRIPT: &str = r#"
local list = {}
local current = redis.call('HGET', KEYS[1], ARGV[1])
if current then
  list = cjson.decode(current)
end
table.insert(list, cjson.decode(ARGV[2]))
redis.call('HSET', KEYS[1], ARGV[1], cjson.encode(list))
redis.call('PEXPIRE', KEYS[1], ARGV[3])
return #list
"#;

const WAGER_REMOVE_SCRIPT: &str = r#"
local current = redis.call('HGET', KEYS[1], ARGV[1])
if not current then
  return false
end
local list = cjson.decode(current)
for i, wager in ipairs(list) do
  if wager['transactionId'] == ARGV[2] then
    table.remove(list, i)
    if #list == 0 then
      redis.call('HDEL', KEYS[1], ARGV[1])
    else
      redis.call('HSET', KEYS[1], ARGV[1], cjson.encode(list))
    end
    return cjson.encode(wager)
  end
end
return false
"#;

/// Redis-backed store. `ConnectionManager` reconnects on its own; clones
/// share one multiplexed connection.
pub struct RedisStore {
    conn: ConnectionManager,
    lease: Script,
    wager_append: Script,
    wager_remove: Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            lease: Script::new(LEASE_SCRIPT),
            wager_append: Script::new(WAGER_APPEND_SCRIPT),
            wager_remove: Script::new(WAGER_REMOVE_SCRIPT),
        }
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_string(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(())
    }

    async fn acquire_or_extend_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn();
        let held: i64 = self
            .lease
            .key(key)
            .arg(holder)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;
        Ok(held == 1)
    }

    async fn wager_append(
        &self,
        key: &str,
        player_id: &str,
        wager_json: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: i64 = self
            .wager_append
            .key(key)
            .arg(player_id)
            .arg(wager_json)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn wager_remove(
        &self,
        key: &str,
        player_id: &str,
        transaction_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn();
        let removed: Option<String> = self
            .wager_remove
            .key(key)
            .arg(player_id)
            .arg(transaction_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(removed)
    }

    async fn wager_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(fields)
    }

    async fn hash_incr_float(&self, key: &str, field: &str, by: f64) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: String = redis::cmd("HINCRBYFLOAT")
            .arg(key)
            .arg(field)
            .arg(by)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn hash_incr_int(&self, key: &str, field: &str, by: i64) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let _: i64 = redis::cmd("HINCRBY")
            .arg(key)
            .arg(field)
            .arg(by)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn();
        let fields: HashMap<String, String> =
            redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(fields)
    }
}
