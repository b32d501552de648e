//! Core rate limiter implementation.

use tracing::{debug, trace};

use super::identity::RequestAttributes;
use super::policy::Policy;
use super::strategy::Decision;

/// Admission outcome for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Pass the request on unchanged
    Proceed(Decision),
    /// Stop processing and answer with a rate limit status
    Reject(Decision),
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Proceed(_))
    }

    pub fn decision(&self) -> &Decision {
        match self {
            Admission::Proceed(d) | Admission::Reject(d) => d,
        }
    }
}

/// Evaluates inbound requests against one policy.
///
/// Holds no mutable state: the only shared mutation is the bucket update the
/// strategy performs in the counter store, so a single instance can be shared
/// across all tasks.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    policy: Policy,
}

impl RateLimiter {
    /// Create a rate limiter for a validated policy.
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Check one request against the policy.
    pub async fn check(&self, attrs: &RequestAttributes) -> Admission {
        let dimension = self.policy.dimension();
        let identity = attrs.resolve(dimension);

        trace!(
            dimension = %dimension,
            identity = %identity,
            strategy = self.policy.strategy().name(),
            "Checking rate limit"
        );

        let decision = self.policy.strategy().evaluate(&identity, &self.policy).await;

        if decision.allowed {
            Admission::Proceed(decision)
        } else {
            debug!(
                dimension = %dimension,
                identity = %identity,
                limit = decision.limit,
                degraded = decision.degraded,
                "Rate limit exceeded"
            );
            Admission::Reject(decision)
        }
    }
}
