//! HTTP server implementation.

use axum::http::StatusCode;
use axum::routing::get;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::client_key::ClientKeyExtractor;
use super::middleware::{admission_middleware, AdmissionState};
use crate::error::{Result, TurnstileError};
use crate::ratelimit::AdmissionGate;

/// HTTP front for the admission gate.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    gate: AdmissionGate,
    extractor: Arc<ClientKeyExtractor>,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(addr: SocketAddr, gate: AdmissionGate, extractor: ClientKeyExtractor) -> Self {
        Self {
            addr,
            gate,
            extractor: Arc::new(extractor),
        }
    }

    /// Build the router: `/limited` behind the gate, `/unlimited` open.
    pub fn router(&self) -> Router {
        let state = AdmissionState {
            gate: self.gate.clone(),
            extractor: Arc::clone(&self.extractor),
        };

        let limited = Router::new()
            .route("/limited", get(handle_limited))
            .route_layer(middleware::from_fn_with_state(state, admission_middleware));

        Router::new()
            .merge(limited)
            .route("/unlimited", get(handle_unlimited))
    }

    /// Start the HTTP server.
    ///
    /// This method will block until the server is shut down.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let listener = TcpListener::bind(self.addr).await?;

        info!(addr = %self.addr, "Starting HTTP server");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            TurnstileError::Io(e)
        })
    }
}

async fn handle_limited() -> StatusCode {
    info!("limited hit");
    StatusCode::OK
}

async fn handle_unlimited() -> StatusCode {
    info!("unlimited hit");
    StatusCode::OK
}
