//! Caller identity resolution.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TollgateError;

/// Identity used when a request carries nothing that identifies the caller.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// The request attribute that distinguishes one caller's quota from another's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum IdentityDimension {
    /// The network origin address of the request
    #[default]
    Ip,
    /// The authenticated user id
    UserId,
    /// The tenant the authenticated principal belongs to
    TenantId,
    /// An arbitrary request header (name stored lowercase)
    Header(String),
}

impl IdentityDimension {
    /// Build a header dimension, normalizing the header name.
    pub fn header(name: &str) -> Self {
        IdentityDimension::Header(name.to_ascii_lowercase())
    }
}

impl fmt::Display for IdentityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityDimension::Ip => write!(f, "ip"),
            IdentityDimension::UserId => write!(f, "user_id"),
            IdentityDimension::TenantId => write!(f, "tenant_id"),
            IdentityDimension::Header(name) => write!(f, "header:{}", name),
        }
    }
}

impl FromStr for IdentityDimension {
    type Err = TollgateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip" => Ok(IdentityDimension::Ip),
            "user_id" => Ok(IdentityDimension::UserId),
            "tenant_id" => Ok(IdentityDimension::TenantId),
            other => match other.strip_prefix("header:") {
                Some(name) if !name.is_empty() => Ok(IdentityDimension::header(name)),
                _ => Err(TollgateError::Config(format!(
                    "unknown identity dimension: {}",
                    other
                ))),
            },
        }
    }
}

impl Serialize for IdentityDimension {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IdentityDimension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Read-only view of the identity-bearing attributes of one inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestAttributes {
    /// Network origin of the request
    pub remote_addr: Option<IpAddr>,
    /// Authenticated user, if an upstream layer established one
    pub user_id: Option<String>,
    /// Tenant of the authenticated principal
    pub tenant_id: Option<String>,
    /// Request headers keyed by lowercase name
    headers: HashMap<String, String>,
}

impl RequestAttributes {
    /// Create an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: set the network origin.
    pub fn with_remote_addr(mut self, addr: IpAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Builder-style: set the authenticated user id.
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Builder-style: set the tenant id.
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Builder-style: add a header value.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Look up a header by (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Resolve the caller identity for a dimension.
    ///
    /// Falls back to the network origin when the dimension has no value, and
    /// to [`ANONYMOUS_IDENTITY`] when the origin is unknown too.
    pub fn resolve(&self, dimension: &IdentityDimension) -> String {
        let natural = match dimension {
            IdentityDimension::Ip => None,
            IdentityDimension::UserId => self.user_id.as_deref(),
            IdentityDimension::TenantId => self.tenant_id.as_deref(),
            IdentityDimension::Header(name) => self.header(name),
        };

        if let Some(value) = natural.filter(|v| !v.is_empty()) {
            return value.to_string();
        }

        match self.remote_addr {
            Some(addr) => addr.to_string(),
            None => ANONYMOUS_IDENTITY.to_string(),
        }
    }
}
