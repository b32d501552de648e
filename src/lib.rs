//! Tollgate - Request Admission Control
//!
//! This crate decides, per incoming request, whether a caller may proceed or
//! has exceeded its configured rate. Counters live in a shared store that
//! offers an atomic increment-with-expiry primitive, so any number of service
//! instances can enforce the same quota.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
