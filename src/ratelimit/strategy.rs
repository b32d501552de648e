//! Rate limit strategy abstraction.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::fixed_window::FixedWindow;
use super::policy::Policy;

/// Result of evaluating one request against a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// The policy limit the request was evaluated against
    pub limit: u64,
    /// Requests left in the current window, when known
    pub remaining: Option<u64>,
    /// Time until the current window ends, when known
    pub reset_after: Option<Duration>,
    /// Set when the decision came from the failure mode rather than the store
    pub degraded: bool,
}

impl Decision {
    /// A decision taken without store input, used when the store failed.
    pub fn degraded(allowed: bool, limit: u64) -> Self {
        Self {
            allowed,
            limit,
            remaining: None,
            reset_after: None,
            degraded: true,
        }
    }
}

/// A rate limiting algorithm.
///
/// Implementations own the bucket semantics (fixed counters, timestamps,
/// refill rates) but must keep the store interaction atomic and must never
/// let a store failure escape: they answer with the policy's failure mode.
#[async_trait]
pub trait RateLimitStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Decide whether `identity` may make one more request under `policy`.
    async fn evaluate(&self, identity: &str, policy: &Policy) -> Decision;
}

/// Strategy selector used in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    FixedWindow,
}

impl StrategyKind {
    /// Instantiate the strategy.
    pub fn build(self) -> Arc<dyn RateLimitStrategy> {
        match self {
            StrategyKind::FixedWindow => Arc::new(FixedWindow::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_from_yaml() {
        let kind: StrategyKind = serde_yaml::from_str("fixed_window").unwrap();
        assert_eq!(kind, StrategyKind::FixedWindow);
        assert_eq!(kind.build().name(), "fixed_window");
    }

    #[test]
    fn test_unknown_strategy_kind_rejected() {
        assert!(serde_yaml::from_str::<StrategyKind>("token_bucket").is_err());
    }

    #[test]
    fn test_degraded_decision() {
        let decision = Decision::degraded(true, 5);
        assert!(decision.allowed);
        assert!(decision.degraded);
        assert_eq!(decision.remaining, None);
    }
}
