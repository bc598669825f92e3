//! Outgoing responses and the JSON responder.
//!
//! Handlers finish a request by returning a [`Response`], usually built with
//! [`respond`]. Errors are turned into responses in exactly one place, the
//! `errors` middleware, which calls [`respond_error`].

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::{Error, FieldError};

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
#[derive(Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Response {
    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: Bytes::new() }
    }

    /// `application/json` response from already-encoded bytes.
    pub fn json(code: StatusCode, body: impl Into<Bytes>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self { status: code, headers, body: body.into() }
    }

    /// Adds or replaces a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`]; lets handlers return `Ok(StatusCode::ACCEPTED)`.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

// ── Responder ─────────────────────────────────────────────────────────────────

/// Body of every error response.
///
/// ```json
/// {"error": "field validation error", "fields": [{"field": "name", "error": "name is a required field"}]}
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

/// Encodes `data` as the JSON body of a `status` response.
///
/// The status is recorded on `ctx` first, so logging sees it whatever happens
/// next. `204 No Content` never has a body and skips encoding. If encoding
/// fails the error is returned and no response exists.
pub fn respond<T>(ctx: &RequestContext, data: &T, status: StatusCode) -> Result<Response, Error>
where
    T: Serialize + ?Sized,
{
    ctx.set_status_code(status);

    if status == StatusCode::NO_CONTENT {
        return Ok(Response::status(status));
    }

    let body = serde_json::to_vec(data)?;
    Ok(Response::json(status, body))
}

/// Converts an error into its client-facing response.
///
/// Request errors keep their status, message and field list. Everything else
/// becomes a `500` with the fixed text `"Internal Server Error"`.
pub fn respond_error(ctx: &RequestContext, err: &Error) -> Result<Response, Error> {
    if let Some(req) = err.as_request_error() {
        let body = ErrorResponse { error: req.message().to_owned(), fields: req.fields().to_vec() };
        return respond(ctx, &body, req.status());
    }

    respond(ctx, &internal_error_body(), StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn internal_error_body() -> ErrorResponse {
    ErrorResponse {
        error: StatusCode::INTERNAL_SERVER_ERROR
            .canonical_reason()
            .unwrap_or("Internal Server Error")
            .to_owned(),
        fields: Vec::new(),
    }
}

/// Last-resort 500 for when even [`respond_error`] failed. Never fails itself.
pub(crate) fn fallback_internal_error(ctx: &RequestContext) -> Response {
    ctx.set_status_code(StatusCode::INTERNAL_SERVER_ERROR);
    Response::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        Bytes::from_static(br#"{"error":"Internal Server Error"}"#),
    )
}
