//! Rate limiting logic and counter store access.

mod bucket;
mod fixed_window;
mod identity;
mod limiter;
mod memory;
mod policy;
mod redis_store;
mod store;
mod strategy;

pub use bucket::{BucketKey, DEFAULT_KEY_PREFIX};
pub use fixed_window::FixedWindow;
pub use identity::{IdentityDimension, RequestAttributes, ANONYMOUS_IDENTITY};
pub use limiter::{Admission, RateLimiter};
pub use memory::InMemoryStore;
pub use policy::{FailureMode, Policy, PolicyBuilder, DEFAULT_STORE_TIMEOUT};
pub use redis_store::{RedisStore, RedisStoreConfig};
pub use store::{CounterStore, StoreError, WindowHit};
pub use strategy::{Decision, RateLimitStrategy, StrategyKind};
