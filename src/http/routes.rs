//! Demo routes behind the admission middleware.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, Level};

use super::middleware::rate_limit;
use crate::ratelimit::RateLimiter;

/// Build the application router with every route behind `limiter`.
///
/// The trace layer wraps the admission middleware, so rejected requests are
/// logged with their method, URI and status as well.
pub fn app(limiter: Arc<RateLimiter>) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/factorial/{num}", get(factorial_handler))
        .layer(middleware::from_fn_with_state(limiter, rate_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

async fn hello() -> &'static str {
    "Hello World!"
}

/// CPU-bound demo endpoint; the computation runs on the blocking pool so it
/// never stalls the async workers.
async fn factorial_handler(Path(num): Path<String>) -> Response {
    let num = match num.parse::<u32>() {
        Ok(n) => n,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid number").into_response(),
    };

    match tokio::task::spawn_blocking(move || factorial(num)).await {
        Ok(Some(value)) => (StatusCode::OK, value.to_string()).into_response(),
        Ok(None) => (StatusCode::BAD_REQUEST, "Number too large").into_response(),
        Err(e) => {
            error!(error = %e, num, "Factorial task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

/// `num!`, or `None` when it does not fit in a `u128`.
pub fn factorial(num: u32) -> Option<u128> {
    (1..=u128::from(num)).try_fold(1u128, |acc, i| acc.checked_mul(i))
}
