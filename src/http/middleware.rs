//! Admission middleware for protected routes.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::warn;

use super::client_key::ClientKeyExtractor;
use crate::error::QuotaExceeded;
use crate::ratelimit::AdmissionGate;

/// State shared by every invocation of [`admission_middleware`].
#[derive(Clone)]
pub struct AdmissionState {
    pub gate: AdmissionGate,
    pub extractor: Arc<ClientKeyExtractor>,
}

impl IntoResponse for QuotaExceeded {
    fn into_response(self) -> Response {
        (StatusCode::TOO_MANY_REQUESTS, self.to_string()).into_response()
    }
}

/// Run the admission gate before the wrapped handler.
///
/// Rejected requests get a 429 and never reach the handler.
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    req: Request,
    next: Next,
) -> Response {
    let key = state.extractor.extract(&req);

    match state.gate.check(&key) {
        Ok(()) => next.run(req).await,
        Err(rejection) => {
            warn!(client = %key, path = %req.uri().path(), "Rejecting rate limited request");
            rejection.into_response()
        }
    }
}
