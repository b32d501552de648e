//! Rate limit policy definition and validation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::identity::IdentityDimension;
use super::store::CounterStore;
use super::strategy::RateLimitStrategy;
use crate::error::{Result, TollgateError};

/// Default upper bound on a single store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// What a strategy answers when the counter store cannot be consulted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Admit the request (availability over strict enforcement)
    #[default]
    Open,
    /// Reject the request
    Closed,
}

impl FailureMode {
    /// Whether a request is admitted under this mode.
    pub fn allows(self) -> bool {
        matches!(self, FailureMode::Open)
    }
}

/// Immutable description of how to limit callers.
///
/// Built once through [`PolicyBuilder`] and shared read-only by every
/// concurrent evaluation.
#[derive(Clone)]
pub struct Policy {
    dimension: IdentityDimension,
    window: Duration,
    limit: u64,
    strategy: Arc<dyn RateLimitStrategy>,
    store: Arc<dyn CounterStore>,
    store_timeout: Duration,
    failure_mode: FailureMode,
}

impl Policy {
    /// Start building a policy.
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    pub fn dimension(&self) -> &IdentityDimension {
        &self.dimension
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn strategy(&self) -> &Arc<dyn RateLimitStrategy> {
        &self.strategy
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("dimension", &self.dimension)
            .field("window", &self.window)
            .field("limit", &self.limit)
            .field("strategy", &self.strategy.name())
            .field("store_timeout", &self.store_timeout)
            .field("failure_mode", &self.failure_mode)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Policy`]; `build` validates every field.
pub struct PolicyBuilder {
    dimension: IdentityDimension,
    window: Option<Duration>,
    limit: Option<u64>,
    strategy: Option<Arc<dyn RateLimitStrategy>>,
    store: Option<Arc<dyn CounterStore>>,
    store_timeout: Duration,
    failure_mode: FailureMode,
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self {
            dimension: IdentityDimension::default(),
            window: None,
            limit: None,
            strategy: None,
            store: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            failure_mode: FailureMode::default(),
        }
    }
}

impl PolicyBuilder {
    pub fn dimension(mut self, dimension: IdentityDimension) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn RateLimitStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn failure_mode(mut self, mode: FailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    /// Validate and freeze the policy.
    pub fn build(self) -> Result<Policy> {
        let limit = match self.limit {
            Some(0) => return Err(config_error("limit must be greater than zero")),
            Some(limit) => limit,
            None => return Err(config_error("limit is required")),
        };

        let window = match self.window {
            Some(w) if w.is_zero() => {
                return Err(config_error("window must be greater than zero"))
            }
            Some(w) => w,
            None => return Err(config_error("window is required")),
        };

        if self.store_timeout.is_zero() {
            return Err(config_error("store timeout must be greater than zero"));
        }

        let strategy = self
            .strategy
            .ok_or_else(|| config_error("strategy is required"))?;
        let store = self.store.ok_or_else(|| config_error("store is required"))?;

        Ok(Policy {
            dimension: self.dimension,
            window,
            limit,
            strategy,
            store,
            store_timeout: self.store_timeout,
            failure_mode: self.failure_mode,
        })
    }
}

fn config_error(msg: &str) -> TollgateError {
    TollgateError::Config(msg.to_string())
}
