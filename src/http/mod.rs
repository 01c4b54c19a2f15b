//! HTTP transport in front of the admission gate.

mod client_key;
mod middleware;
mod server;

pub use client_key::{ClientKeyExtractor, DEFAULT_CLIENT_KEY_HEADERS, UNKNOWN_CLIENT};
pub use middleware::{admission_middleware, AdmissionState};
pub use server::HttpServer;
