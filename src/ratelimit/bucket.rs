//! Bucket key generation.

use super::identity::IdentityDimension;

/// Key prefix applied when none is configured.
pub const DEFAULT_KEY_PREFIX: &str = "rate_limit:";

/// A key that uniquely identifies one caller's bucket in the counter store.
///
/// The key is composed of the identity dimension and the resolved identity,
/// so the same caller limited along two dimensions owns two buckets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// The dimension the identity was resolved along
    pub dimension: IdentityDimension,
    /// The resolved caller identity
    pub identity: String,
}

impl BucketKey {
    /// Create a new bucket key.
    pub fn new(dimension: &IdentityDimension, identity: &str) -> Self {
        Self {
            dimension: dimension.clone(),
            identity: identity.to_string(),
        }
    }

    /// Render the key as stored, under the given prefix.
    pub fn with_prefix(&self, prefix: &str) -> String {
        format!("{}{}:{}", prefix, self.dimension, self.identity)
    }
}

impl std::fmt::Display for BucketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dimension, self.identity)
    }
}
