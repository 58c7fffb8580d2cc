// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exception taxonomy for the API error relay.
//!
//! Applications derive their domain errors from [`ApiException`]: any error
//! implementing the trait is eligible for status-code mapping, carries a
//! safe-to-expose [`context`](ApiException::context) payload, and may carry a
//! sensitive [`developer_context`](ApiException::developer_context) payload
//! that is only surfaced when explicitly enabled.
//!
//! Everything caught at the framework boundary is wrapped in a
//! [`CaughtError`], which is the single input type the classification
//! pipeline operates on.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;

// ---------------------------------------------------------------------------
// ApiException
// ---------------------------------------------------------------------------

/// Base trait for application errors that should receive a mapped status code.
///
/// Errors that do not implement this trait are always classified as
/// unexpected (500). Mapping is keyed on the concrete runtime type, which is
/// why implementors must expose themselves through
/// [`as_any`](ApiException::as_any):
///
/// ```
/// use aer_taxonomy::ApiException;
/// use std::any::Any;
///
/// #[derive(Debug, thiserror::Error)]
/// #[error("value {value} is out of range")]
/// struct OutOfRange {
///     value: i64,
/// }
///
/// impl ApiException for OutOfRange {
///     fn context(&self) -> serde_json::Value {
///         serde_json::json!({ "value": self.value })
///     }
///
///     fn as_any(&self) -> &dyn Any {
///         self
///     }
/// }
/// ```
pub trait ApiException: StdError + Send + Sync + 'static {
    /// Safe-to-expose diagnostic payload, included in every mapped response.
    fn context(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// Sensitive diagnostic payload, only included when the mapper is
    /// configured to respond with developer context.
    fn developer_context(&self) -> Option<serde_json::Value> {
        None
    }

    /// The concrete instance as [`Any`], for exact-runtime-type dispatch.
    fn as_any(&self) -> &dyn Any;
}

// ---------------------------------------------------------------------------
// OperationCanceled
// ---------------------------------------------------------------------------

/// Cooperative-cancellation signal observed at the boundary.
///
/// Deliberately not an [`ApiException`]: cancellation can never be mapped and
/// always classifies to 500 / `OperationCanceled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCanceled;

impl fmt::Display for OperationCanceled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("the operation was canceled")
    }
}

impl StdError for OperationCanceled {}

// ---------------------------------------------------------------------------
// CaughtError
// ---------------------------------------------------------------------------

/// An unhandled error caught at the framework boundary.
///
/// The variant decides the classification family; the registry is only
/// consulted for [`Api`](CaughtError::Api) values.
pub enum CaughtError {
    /// A domain error implementing [`ApiException`].
    Api(Box<dyn ApiException>),
    /// A cooperative-cancellation signal.
    Canceled(OperationCanceled),
    /// Any other error.
    Unexpected(Box<dyn StdError + Send + Sync>),
}

impl CaughtError {
    /// Wraps a domain error.
    pub fn api(exception: impl ApiException) -> Self {
        Self::Api(Box::new(exception))
    }

    /// Wraps an arbitrary error, routing [`OperationCanceled`] to the
    /// cancellation variant.
    pub fn unexpected(error: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        let error = error.into();
        match error.downcast::<OperationCanceled>() {
            Ok(canceled) => Self::Canceled(*canceled),
            Err(error) => Self::Unexpected(error),
        }
    }

    /// Human-readable message of the inner error.
    pub fn message(&self) -> String {
        match self {
            Self::Api(e) => e.to_string(),
            Self::Canceled(e) => e.to_string(),
            Self::Unexpected(e) => e.to_string(),
        }
    }

    /// Full chain-of-causation rendering: the error's own message followed by
    /// each `source()` in order.
    pub fn trace(&self) -> String {
        let mut out = self.message();
        let mut source = self.source();
        while let Some(err) = source {
            out.push_str("\ncaused by: ");
            out.push_str(&err.to_string());
            source = err.source();
        }
        out
    }

    /// Underlying cause of the inner error, if any.
    pub fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Api(e) => e.source(),
            Self::Canceled(e) => e.source(),
            Self::Unexpected(e) => e.source(),
        }
    }

    /// Returns `true` for the cancellation variant.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled(_))
    }
}

impl fmt::Display for CaughtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl fmt::Debug for CaughtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api(e) => f.debug_tuple("Api").field(&e.to_string()).finish(),
            Self::Canceled(e) => f.debug_tuple("Canceled").field(e).finish(),
            Self::Unexpected(e) => f.debug_tuple("Unexpected").field(&e.to_string()).finish(),
        }
    }
}

impl From<OperationCanceled> for CaughtError {
    fn from(canceled: OperationCanceled) -> Self {
        Self::Canceled(canceled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
