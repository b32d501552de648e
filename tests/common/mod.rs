//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tollgate::ratelimit::{
    BucketKey, CounterStore, FailureMode, FixedWindow, IdentityDimension, InMemoryStore, Policy,
    RateLimiter, StoreError, WindowHit,
};

/// A store whose every call fails, as if the server were unreachable.
pub struct UnreachableStore;

#[async_trait]
impl CounterStore for UnreachableStore {
    async fn hit(&self, _: &BucketKey, _: u64, _: Duration) -> Result<WindowHit, StoreError> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }
}

pub fn limiter_with(
    store: Arc<dyn CounterStore>,
    dimension: IdentityDimension,
    limit: u64,
    window: Duration,
    failure_mode: FailureMode,
) -> Arc<RateLimiter> {
    let policy = Policy::builder()
        .dimension(dimension)
        .window(window)
        .limit(limit)
        .strategy(Arc::new(FixedWindow::new()))
        .store(store)
        .failure_mode(failure_mode)
        .build()
        .expect("valid policy");
    Arc::new(RateLimiter::new(policy))
}

/// Per-IP limiter over a fresh in-memory store.
pub fn memory_limiter(limit: u64, window: Duration) -> Arc<RateLimiter> {
    limiter_with(
        Arc::new(InMemoryStore::new()),
        IdentityDimension::Ip,
        limit,
        window,
        FailureMode::Open,
    )
}
