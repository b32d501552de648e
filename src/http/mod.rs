//! HTTP surface: admission middleware and demo routes.

mod middleware;
mod routes;
mod server;

pub use middleware::{rate_limit, request_attributes, Principal, REJECTION_BODY, UNAVAILABLE_BODY};
pub use routes::{app, factorial};
pub use server::HttpServer;
