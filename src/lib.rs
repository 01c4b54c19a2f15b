//! Turnstile - Per-Client Admission Control
//!
//! This crate decides, per client key, whether a request may proceed or has
//! exceeded its quota within a rolling window. The core lives in
//! [`ratelimit`]; [`http`] is a thin axum front that extracts client keys and
//! turns rejections into `429 Too Many Requests`.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
