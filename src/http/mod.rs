//! HTTP transport
//!
//! Retrying, rate-limited client wrapping reqwest. Pagination state and
//! schema resolution sit above this layer; only transport concerns live
//! here.

mod client;
mod rate_limit;

pub use client::{HttpClient, RequestConfig};
pub use rate_limit::RateLimiter;
