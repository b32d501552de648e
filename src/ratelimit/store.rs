//! Counter store capability.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::bucket::BucketKey;

/// Errors raised while talking to a counter store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("unexpected store reply: {0}")]
    Protocol(String),
}

/// Outcome of one atomic hit against a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    /// Whether the hit was counted
    pub allowed: bool,
    /// Bucket value after the hit (unchanged when denied)
    pub count: u64,
    /// Remaining lifetime of the bucket, when the store knows it
    pub reset_after: Option<Duration>,
}

/// A shared key-value store offering atomic increment-with-expiry.
///
/// `hit` must execute read, limit check, increment and first-write expiry as
/// one indivisible unit per key: two concurrent hits on the same bucket can
/// never both observe `count < limit` and both increment past it.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one request against `key` unless it already reached `limit`.
    ///
    /// A bucket that is absent (or expired) is created with value 1 and an
    /// expiry of `window`; later hits in the same window never move the expiry.
    async fn hit(
        &self,
        key: &BucketKey,
        limit: u64,
        window: Duration,
    ) -> Result<WindowHit, StoreError>;
}
