// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error-response building for the API error relay.
//!
//! [`build_api_error`] is the classification pipeline: it takes the caught
//! error, the immutable [`ExceptionMapper`], and per-request context, and
//! produces the wire-level [`ApiError`] plus the status code to set on the
//! response. Classification is a single-pass, terminal computation with
//! three outcomes: mapped domain error, cancellation, or unexpected.
//!
//! Per-request failures never escape this crate: listener errors are logged
//! and swallowed, and resolver failures demote the request to the
//! unexpected path.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use aer_mapping::ExceptionMapper;
use aer_taxonomy::{ApiException, CaughtError};
use http::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Error name emitted for the unexpected-error fallback.
pub const INTERNAL_SERVER_ERROR: &str = "InternalServerError";
/// Error name emitted for observed cancellation signals.
pub const OPERATION_CANCELED: &str = "OperationCanceled";
/// Error code emitted for both fallback classifications.
pub const UNEXPECTED_ERROR_CODE: i32 = -1;
/// Message used by validation-failure helpers.
pub const MODEL_BINDING_ERROR_MESSAGE: &str = "Invalid parameters.";

// ---------------------------------------------------------------------------
// ApiError
// ---------------------------------------------------------------------------

/// The wire-level error body.
///
/// Serialises with camelCase field names; optional fields are omitted
/// entirely when unset, never emitted as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Name of the emitting service.
    pub service: String,
    /// Request trace identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Short, user-safe summary.
    pub message: String,
    /// Longer diagnostic text; verbosity depends on the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_message: Option<String>,
    /// Stable numeric error code.
    pub error_code: i32,
    /// Stable error category name.
    pub error: String,
    /// Safe-to-expose diagnostic payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
    /// Sensitive diagnostic payload, present only when explicitly enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub developer_context: Option<serde_json::Value>,
}

impl ApiError {
    /// Builds the body for a model-validation failure, with the individual
    /// violations carried in `context`.
    pub fn from_validation(
        error_code: i32,
        error: impl Into<String>,
        violations: serde_json::Value,
        correlation_id: Option<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            correlation_id,
            message: MODEL_BINDING_ERROR_MESSAGE.to_owned(),
            detailed_message: None,
            error_code,
            error: error.into(),
            context: Some(violations),
            developer_context: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RequestContext & listeners
// ---------------------------------------------------------------------------

/// Per-request inputs to classification.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request trace identifier, echoed back in the body.
    pub correlation_id: Option<String>,
    /// Whether the process runs in a development environment.
    pub is_development: bool,
}

/// Error returned by a failing listener.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Side-effect callback invoked with the raw caught error before
/// classification (e.g. forwarding to an error tracker).
///
/// Listener failures are logged and swallowed; they never affect the
/// response or the remaining listeners.
pub type ExceptionListener = Box<dyn Fn(&CaughtError) -> Result<(), ListenerError> + Send + Sync>;

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies a caught error into a status code and a fully-populated
/// [`ApiError`].
///
/// Listeners run first, in registration order. Classification then follows
/// the three-way split described in the crate docs. The message policy is
/// environment-sensitive: development responses carry the raw message and
/// the full causation trace, production responses carry a humanized reason
/// phrase and only the raw message.
pub fn build_api_error(
    caught: &CaughtError,
    mapper: &ExceptionMapper,
    ctx: &RequestContext,
    listeners: &[ExceptionListener],
) -> (StatusCode, ApiError) {
    for listener in listeners {
        if let Err(e) = listener(caught) {
            warn!(listener.error = %e, "exception listener failed");
        }
    }

    let mut context = serde_json::json!({});
    let mut developer_context = None;

    let (status, error_code, error_name) = match caught {
        CaughtError::Api(exception) => match classify_mapped(exception.as_ref(), mapper) {
            Some((status, code, name)) => {
                context = exception.context();
                if mapper.options().respond_with_developer_context {
                    developer_context = exception.developer_context();
                }
                (status, code, name)
            }
            None => unexpected(caught),
        },
        CaughtError::Canceled(_) => {
            warn!(status = 500, "cancellation signal reached the error relay");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                UNEXPECTED_ERROR_CODE,
                OPERATION_CANCELED.to_owned(),
            )
        }
        CaughtError::Unexpected(_) => unexpected(caught),
    };

    let (message, detailed_message) = if ctx.is_development {
        (caught.message(), Some(caught.trace()))
    } else {
        (humanize_status(status), Some(caught.message()))
    };

    let body = ApiError {
        service: mapper.options().service_name.clone(),
        correlation_id: ctx.correlation_id.clone(),
        message,
        detailed_message,
        error_code,
        error: error_name,
        context: Some(context),
        developer_context,
    };
    (status, body)
}

/// Registry hit plus a successful resolver run, or `None` to fall through to
/// the unexpected path.
fn classify_mapped(
    exception: &dyn ApiException,
    mapper: &ExceptionMapper,
) -> Option<(StatusCode, i32, String)> {
    let entry = mapper.lookup(exception)?;
    match entry.resolve(exception) {
        Ok((code, name)) => {
            info!(
                exception_type = entry.exception_type(),
                status = entry.status().as_u16(),
                "mapped api exception"
            );
            Some((entry.status(), code, name))
        }
        Err(e) => {
            warn!(
                exception_type = entry.exception_type(),
                resolver.error = %e,
                "error code resolver failed, treating exception as unexpected"
            );
            None
        }
    }
}

fn unexpected(caught: &CaughtError) -> (StatusCode, i32, String) {
    error!(error = %caught, "unhandled error reached the error relay");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        UNEXPECTED_ERROR_CODE,
        INTERNAL_SERVER_ERROR.to_owned(),
    )
}

// ---------------------------------------------------------------------------
// Reason-phrase humanizer
// ---------------------------------------------------------------------------

/// Humanizes a status code's reason phrase: first word keeps its case,
/// subsequent words are lowercased (`500` → `"Internal server error"`).
#[must_use]
pub fn humanize_status(status: StatusCode) -> String {
    let phrase = status.canonical_reason().unwrap_or("Unknown Error");
    let mut words = phrase.split(' ');
    let mut out = String::with_capacity(phrase.len());
    if let Some(first) = words.next() {
        out.push_str(first);
    }
    for word in words {
        out.push(' ');
        out.push_str(&word.to_lowercase());
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
