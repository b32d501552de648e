//! Redis-backed counter store.
//!
//! The whole read-check-increment-expire sequence runs inside one Lua script,
//! which Redis executes atomically: no other command touches the key between
//! the `GET` and the `INCR`, so concurrent callers cannot overshoot the limit.
//!
//! Keys look like `rate_limit:ip:10.0.0.1`. The expiry is set with `PEXPIRE`
//! only when `INCR` creates the key, so a window always ends exactly
//! `window` after its first request.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, ErrorKind, RedisError, Script};
use tracing::info;

use super::bucket::{BucketKey, DEFAULT_KEY_PREFIX};
use super::store::{CounterStore, StoreError, WindowHit};

/// Returns `{allowed, count, pttl}`.
const FIXED_WINDOW_SCRIPT: &str = r#"
local current = redis.call("GET", KEYS[1])
if current and tonumber(current) >= tonumber(ARGV[1]) then
  return {0, tonumber(current), redis.call("PTTL", KEYS[1])}
end

local count = redis.call("INCR", KEYS[1])
if count == 1 then
  redis.call("PEXPIRE", KEYS[1], ARGV[2])
end
return {1, count, redis.call("PTTL", KEYS[1])}
"#;

/// Configuration for the Redis store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Prefix prepended to every bucket key (default: "rate_limit:")
    pub key_prefix: String,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

/// [`CounterStore`] shared by every instance pointed at the same Redis.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    script: Script,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis with default configuration.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::connect_with_config(url, RedisStoreConfig::default()).await
    }

    /// Connect to Redis with custom configuration.
    pub async fn connect_with_config(
        url: &str,
        config: RedisStoreConfig,
    ) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;

        info!(url = %url, key_prefix = %config.key_prefix, "Connected to Redis counter store");

        Ok(Self {
            connection,
            script: Script::new(FIXED_WINDOW_SCRIPT),
            config,
        })
    }

    fn key(&self, key: &BucketKey) -> String {
        key.with_prefix(&self.config.key_prefix)
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn hit(
        &self,
        key: &BucketKey,
        limit: u64,
        window: Duration,
    ) -> Result<WindowHit, StoreError> {
        let mut conn = self.connection.clone();
        let window_ms = window.as_millis().max(1) as u64;

        let (allowed, count, pttl): (i64, i64, i64) = self
            .script
            .key(self.key(key))
            .arg(limit)
            .arg(window_ms)
            .invoke_async(&mut conn)
            .await?;

        if count < 0 {
            return Err(StoreError::Protocol(format!("negative count {}", count)));
        }

        Ok(WindowHit {
            allowed: allowed == 1,
            count: count as u64,
            // PTTL is -1 (no expiry) or -2 (missing) when unknown
            reset_after: u64::try_from(pttl).ok().map(Duration::from_millis),
        })
    }
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(Duration::ZERO)
        } else if err.kind() == ErrorKind::TypeError {
            StoreError::Protocol(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}
