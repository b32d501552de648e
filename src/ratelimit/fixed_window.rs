//! Fixed window rate limiting.

use async_trait::async_trait;
use tracing::{trace, warn};

use super::bucket::BucketKey;
use super::policy::Policy;
use super::store::StoreError;
use super::strategy::{Decision, RateLimitStrategy};

/// Counts requests per identity in windows of `policy.window()`.
///
/// A window opens with the first request of an identity and closes when the
/// store expires the bucket; the next request after that opens a new one.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedWindow;

impl FixedWindow {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RateLimitStrategy for FixedWindow {
    fn name(&self) -> &'static str {
        "fixed_window"
    }

    async fn evaluate(&self, identity: &str, policy: &Policy) -> Decision {
        let key = BucketKey::new(policy.dimension(), identity);
        let limit = policy.limit();

        let result = tokio::time::timeout(
            policy.store_timeout(),
            policy.store().hit(&key, limit, policy.window()),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout(policy.store_timeout())));

        match result {
            Ok(hit) => {
                trace!(
                    key = %key,
                    count = hit.count,
                    limit,
                    allowed = hit.allowed,
                    "Fixed window hit"
                );
                Decision {
                    allowed: hit.allowed,
                    limit,
                    remaining: Some(limit.saturating_sub(hit.count)),
                    reset_after: hit.reset_after,
                    degraded: false,
                }
            }
            Err(err) => {
                let mode = policy.failure_mode();
                warn!(
                    key = %key,
                    error = %err,
                    failure_mode = ?mode,
                    "Counter store failed, applying failure mode"
                );
                Decision::degraded(mode.allows(), limit)
            }
        }
    }
}
