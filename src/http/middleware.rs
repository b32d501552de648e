//! Admission middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::ratelimit::{Admission, Decision, RateLimiter, RequestAttributes};

/// Body of a rejected request.
pub const REJECTION_BODY: &str = "limit exceeded";

/// Body of a request refused because the counter store could not be reached.
pub const UNAVAILABLE_BODY: &str = "rate limiter unavailable";

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Authenticated caller, inserted as a request extension by an upstream
/// authentication layer.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
}

/// Collect the identity-bearing attributes of a request.
pub fn request_attributes(request: &Request) -> RequestAttributes {
    let mut attrs = RequestAttributes::new();

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        attrs = attrs.with_remote_addr(addr.ip());
    }

    if let Some(principal) = request.extensions().get::<Principal>() {
        if let Some(user_id) = &principal.user_id {
            attrs = attrs.with_user_id(user_id.clone());
        }
        if let Some(tenant_id) = &principal.tenant_id {
            attrs = attrs.with_tenant_id(tenant_id.clone());
        }
    }

    for (name, value) in request.headers() {
        if let Ok(value) = value.to_str() {
            attrs = attrs.with_header(name.as_str(), value);
        }
    }

    attrs
}

/// Admit or reject a request before it reaches the routes.
///
/// Use with `axum::middleware::from_fn_with_state`.
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let attrs = request_attributes(&request);

    match limiter.check(&attrs).await {
        Admission::Proceed(decision) => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &decision);
            response
        }
        // Fail-closed store outage: not a rate limit signal
        Admission::Reject(decision) if decision.degraded => {
            (StatusCode::SERVICE_UNAVAILABLE, UNAVAILABLE_BODY).into_response()
        }
        Admission::Reject(decision) => {
            let mut response = (StatusCode::TOO_MANY_REQUESTS, REJECTION_BODY).into_response();
            let headers = response.headers_mut();
            add_rate_limit_headers(headers, &decision);
            if let Some(reset_after) = decision.reset_after {
                // Whole seconds, rounded up
                let secs = reset_after.as_secs() + u64::from(reset_after.subsec_nanos() > 0);
                headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
            }
            response
        }
    }
}

fn add_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    if let Some(remaining) = decision.remaining {
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_request_attributes_from_extensions_and_headers() {
        let mut request = axum::http::Request::builder()
            .uri("/")
            .header("X-Api-Key", "key-1")
            .body(Body::empty())
            .unwrap();
        let origin = SocketAddr::from(([172, 16, 0, 3], 51000));
        request.extensions_mut().insert(ConnectInfo(origin));
        request.extensions_mut().insert(Principal {
            user_id: Some("alice".to_string()),
            tenant_id: None,
        });

        let attrs = request_attributes(&request);

        assert_eq!(attrs.remote_addr, Some(IpAddr::V4(Ipv4Addr::new(172, 16, 0, 3))));
        assert_eq!(attrs.user_id.as_deref(), Some("alice"));
        assert_eq!(attrs.tenant_id, None);
        assert_eq!(attrs.header("x-api-key"), Some("key-1"));
    }

    #[test]
    fn test_request_attributes_empty_request() {
        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let attrs = request_attributes(&request);

        assert_eq!(attrs.remote_addr, None);
        assert_eq!(attrs.user_id, None);
    }
}
