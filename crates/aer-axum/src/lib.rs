// SPDX-License-Identifier: MIT OR Apache-2.0
//! Axum boundary glue for the API error relay.
//!
//! [`ApiExceptionHandler`] is the dispatcher: it runs the classification
//! pipeline for a caught error and writes the serialized [`ApiError`] (or a
//! custom-transformed body) onto an axum response. [`Fault`] lets handlers
//! `?`-propagate domain errors straight into that pipeline.
//!
//! This crate is thin by design; all classification rules live in
//! `aer-response` and `aer-mapping`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use aer_mapping::{ExceptionMapper, installed};
use aer_response::{ApiError, ExceptionListener, ListenerError, RequestContext, build_api_error};
use aer_taxonomy::{ApiException, CaughtError};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::error;
use uuid::Uuid;

/// Custom body transform, applied after classification.
///
/// Lets the caller emit a differently-shaped wire body (e.g. an RFC 7807
/// problem object) while reusing the classification logic.
pub type ResponseTransform = Box<dyn Fn(&ApiError, StatusCode) -> serde_json::Value + Send + Sync>;

// ---------------------------------------------------------------------------
// ApiExceptionHandler
// ---------------------------------------------------------------------------

/// Dispatcher that turns caught errors into JSON error responses.
pub struct ApiExceptionHandler {
    mapper: Arc<ExceptionMapper>,
    is_development: bool,
    listeners: Vec<ExceptionListener>,
    transform: Option<ResponseTransform>,
}

impl ApiExceptionHandler {
    /// Creates a handler over the given mapper, in production mode, with no
    /// listeners and no transform.
    #[must_use]
    pub fn new(mapper: Arc<ExceptionMapper>) -> Self {
        Self {
            mapper,
            is_development: false,
            listeners: Vec::new(),
            transform: None,
        }
    }

    /// Sets the development-environment flag.
    #[must_use]
    pub fn development(mut self, is_development: bool) -> Self {
        self.is_development = is_development;
        self
    }

    /// Appends a side-effect listener; listeners run in registration order.
    #[must_use]
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&CaughtError) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Installs a custom body transform.
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: Fn(&ApiError, StatusCode) -> serde_json::Value + Send + Sync + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Classifies `caught` and writes the response.
    ///
    /// Never panics: a serialization failure degrades to a minimal body.
    pub fn handle(&self, caught: CaughtError, correlation_id: Option<String>) -> Response {
        let ctx = RequestContext {
            correlation_id,
            is_development: self.is_development,
        };
        let (status, api_error) = build_api_error(&caught, &self.mapper, &ctx, &self.listeners);

        let body = match &self.transform {
            Some(transform) => transform(&api_error, status),
            None => serde_json::to_value(&api_error).unwrap_or_else(|e| {
                error!(serialize.error = %e, "failed to serialize api error body");
                fallback_body(&api_error.service)
            }),
        };

        json_response(status, &body)
    }
}

fn fallback_body(service: &str) -> serde_json::Value {
    serde_json::json!({
        "service": service,
        "message": "Internal server error",
        "errorCode": -1,
        "error": "InternalServerError",
    })
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Fault
// ---------------------------------------------------------------------------

/// Error wrapper for axum handlers.
///
/// Handlers returning `Result<_, Fault>` can `?` any [`ApiException`]; the
/// `IntoResponse` impl runs the caught error through the process-wide
/// installed mapper. Without an installed mapper the response degrades to a
/// bare 500 body.
pub struct Fault(pub CaughtError);

impl Fault {
    /// Wraps an already-built [`CaughtError`].
    #[must_use]
    pub fn new(caught: CaughtError) -> Self {
        Self(caught)
    }

    /// Wraps an arbitrary non-domain error.
    pub fn unexpected(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(CaughtError::unexpected(error))
    }
}

impl<E: ApiException> From<E> for Fault {
    fn from(exception: E) -> Self {
        Self(CaughtError::api(exception))
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        match installed() {
            Some(mapper) => ApiExceptionHandler::new(mapper).handle(self.0, None),
            None => {
                error!("no exception mapper installed, returning bare 500");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &fallback_body("unknown-service"),
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Correlation-id plumbing
// ---------------------------------------------------------------------------

/// Correlation id for a request: the `x-request-id` header when present,
/// otherwise a fresh UUID.
#[must_use]
pub fn correlation_id_from(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
