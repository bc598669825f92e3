//! Error taxonomy for the handler chain.
//!
//! Every failure a handler or middleware can produce is one of three kinds:
//!
//! | Variant | Meaning | Wire outcome |
//! |---|---|---|
//! | [`Error::Request`] | client caused, carries a status and optional field errors | that status + `{error, fields}` |
//! | [`Error::Shutdown`] | the process can no longer serve correctly | generic 500, then graceful termination |
//! | [`Error::Other`] | anything else | generic 500, detail only in the logs |
//!
//! Errors travel up the chain untouched. The `errors` middleware is the single
//! place that turns one into bytes.

use std::error::Error as StdError;

use http::StatusCode;
use serde::Serialize;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The error type returned by handlers and middleware.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Client-caused failure. Recovered into a JSON response.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Unrecoverable condition. The dispatcher asks the process to shut down.
    #[error("shutdown requested: {0}")]
    Shutdown(String),

    /// Unclassified failure. Mapped to 500; the text never reaches the client.
    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Wraps any error as an unclassified failure.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    pub fn shutdown(reason: impl Into<String>) -> Self {
        Self::Shutdown(reason.into())
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown(_))
    }

    /// Returns the request error this value carries, if it is one.
    pub fn as_request_error(&self) -> Option<&RequestError> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

// ── RequestError ──────────────────────────────────────────────────────────────

/// A failure the client can fix.
///
/// `message` is shown to the client as-is, so it must never contain internal
/// detail. Put that in `source`; it only reaches the logs.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    message: String,
    status: StatusCode,
    fields: Vec<FieldError>,
    #[source]
    source: Option<BoxError>,
}

impl RequestError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { message: message.into(), status, fields: Vec::new(), source: None }
    }

    /// `400 Bad Request`.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Authentication failure, always `401 Unauthorized`.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    /// Authorization failure, always `403 Forbidden`.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn with_fields(mut self, fields: Vec<FieldError>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn message(&self) -> &str { &self.message }
    pub fn status(&self) -> StatusCode { self.status }
    pub fn fields(&self) -> &[FieldError] { &self.fields }
}

/// One violated constraint, reported under the field's JSON name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub error: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, error: impl Into<String>) -> Self {
        Self { field: field.into(), error: error.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_displays_client_message_only() {
        let err = RequestError::unauthorized("Unauthorized")
            .with_source(std::io::Error::other("kid 1234 not in key ring"));
        assert_eq!(err.to_string(), "Unauthorized");
        assert!(err.source().is_some());
    }

    #[test]
    fn classification() {
        let req: Error = RequestError::forbidden("nope").into();
        assert_eq!(req.as_request_error().map(RequestError::status), Some(StatusCode::FORBIDDEN));
        assert!(!req.is_shutdown());

        let shut = Error::shutdown("claims missing");
        assert!(shut.is_shutdown());
        assert!(shut.as_request_error().is_none());

        let other = Error::other("db exploded");
        assert!(!other.is_shutdown());
        assert!(other.as_request_error().is_none());
    }
}
