//! Configuration management for Tollgate.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use tracing::info;

use crate::error::{Result, TollgateError};
use crate::ratelimit::{
    CounterStore, FailureMode, IdentityDimension, InMemoryStore, Policy, RedisStore,
    RedisStoreConfig, StrategyKind, DEFAULT_KEY_PREFIX,
};

/// Prefix for environment overrides, e.g. `TOLLGATE__POLICY__LIMIT=10`.
const ENV_PREFIX: &str = "TOLLGATE";

/// How often the in-memory store drops expired buckets.
const PURGE_INTERVAL: Duration = Duration::from_secs(30);

/// Main configuration for the Tollgate service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TollgateConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Counter store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Rate limit policy configuration
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

/// Which counter store backs the limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local counters
    #[default]
    Memory,
    /// Counters shared through Redis
    Redis,
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix for bucket keys in Redis
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Upper bound on one store round trip in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            redis_url: default_redis_url(),
            key_prefix: default_key_prefix(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_timeout_ms() -> u64 {
    250
}

/// Rate limit policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Request attribute identifying the caller
    #[serde(default)]
    pub identity: IdentityDimension,

    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Requests admitted per window per identity
    #[serde(default = "default_limit")]
    pub limit: u64,

    #[serde(default)]
    pub strategy: StrategyKind,

    /// Behaviour when the store cannot be reached
    #[serde(default)]
    pub failure_mode: FailureMode,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            identity: IdentityDimension::default(),
            window_ms: default_window_ms(),
            limit: default_limit(),
            strategy: StrategyKind::default(),
            failure_mode: FailureMode::default(),
        }
    }
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_limit() -> u64 {
    5
}

impl TollgateConfig {
    /// Load configuration from an optional YAML file, overridden by
    /// `TOLLGATE__`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<TollgateConfig>())
            .map_err(|e| TollgateError::Config(e.to_string()))
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TollgateError::Config(format!("Failed to parse configuration: {}", e)))
    }

    /// Open the configured counter store.
    ///
    /// The in-memory backend gets a background purge task; a Redis backend
    /// that cannot be reached fails with [`TollgateError::Store`].
    pub async fn connect_store(&self) -> Result<Arc<dyn CounterStore>> {
        match self.store.backend {
            StoreBackend::Memory => {
                let store = Arc::new(InMemoryStore::new());
                store.spawn_purge_task(PURGE_INTERVAL);
                info!("Using in-memory counter store");
                Ok(store)
            }
            StoreBackend::Redis => {
                let redis_config = RedisStoreConfig {
                    key_prefix: self.store.key_prefix.clone(),
                };
                let store =
                    RedisStore::connect_with_config(&self.store.redis_url, redis_config).await?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Build the validated policy for a connected store.
    pub fn build_policy(&self, store: Arc<dyn CounterStore>) -> Result<Policy> {
        Policy::builder()
            .dimension(self.policy.identity.clone())
            .window(Duration::from_millis(self.policy.window_ms))
            .limit(self.policy.limit)
            .strategy(self.policy.strategy.build())
            .store(store)
            .store_timeout(Duration::from_millis(self.store.timeout_ms))
            .failure_mode(self.policy.failure_mode)
            .build()
    }
}
