//! Client key extraction.
//!
//! A client key is derived from an ordered chain of request headers; the
//! first header with a non-empty value wins. With no usable header the
//! peer's IP address is used, without its port.

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderName, Request};
use std::net::SocketAddr;

use crate::error::{Result, TurnstileError};

/// Headers consulted by default, in priority order.
pub const DEFAULT_CLIENT_KEY_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Key used when neither a header nor a peer address is available.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derives a client key from a request.
#[derive(Debug, Clone)]
pub struct ClientKeyExtractor {
    headers: Vec<HeaderName>,
}

impl ClientKeyExtractor {
    /// Create an extractor that consults `headers` in order.
    ///
    /// # Errors
    /// Returns [`TurnstileError::Config`] if a name is not a valid header name.
    pub fn new<I, S>(headers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let headers = headers
            .into_iter()
            .map(|name| {
                let name = name.as_ref();
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                    TurnstileError::Config(format!("invalid client key header '{}': {}", name, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { headers })
    }

    /// Pick the first non-empty header value, falling back to `peer`.
    pub fn key_from_parts(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        self.headers
            .iter()
            .filter_map(|name| headers.get(name))
            .filter_map(|value| value.to_str().ok())
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_owned)
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    /// Derive the client key for `req`.
    ///
    /// The peer address is read from axum's `ConnectInfo<SocketAddr>`
    /// extension when the server was started with connect info.
    pub fn extract<B>(&self, req: &Request<B>) -> String {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        self.key_from_parts(req.headers(), peer)
    }
}

impl Default for ClientKeyExtractor {
    fn default() -> Self {
        Self {
            headers: DEFAULT_CLIENT_KEY_HEADERS
                .into_iter()
                .map(HeaderName::from_static)
                .collect(),
        }
    }
}
