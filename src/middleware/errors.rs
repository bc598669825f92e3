//! The single error-to-response translation point.

use std::error::Error as _;
use std::sync::Arc;

use tracing::{error, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, from_fn};
use crate::middleware::{BoxedMiddleware, boxed};
use crate::response::{Response, respond_error};

/// Converts any error returned below it into a response.
///
/// Request errors become their own status and body; everything else becomes
/// a generic 500. The full error is logged either way. Shutdown errors are
/// answered too, then passed on so the dispatcher can stop the process.
pub fn errors() -> BoxedMiddleware {
    boxed(|next: BoxedHandler| {
        from_fn(move |ctx, req| {
            let next = Arc::clone(&next);
            async move {
                let err = match next.call(ctx.clone(), req).await {
                    Ok(res) => return Ok(res),
                    Err(err) => err,
                };

                match &err {
                    Error::Request(e) => warn!(
                        trace_id = ctx.trace_id(),
                        status = e.status().as_u16(),
                        error = %e,
                        source = %e.source().map(ToString::to_string).unwrap_or_default(),
                        "request error"
                    ),
                    _ => error!(trace_id = ctx.trace_id(), error = %err, "request failed"),
                }

                let res: Response = respond_error(&ctx, &err)?;

                if err.is_shutdown() {
                    return Err(err);
                }
                Ok(res)
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::context::RequestContext;
    use crate::error::RequestError;
    use crate::request::Request;

    fn failing(make: fn() -> Error) -> BoxedHandler {
        from_fn(move |_ctx, _req| async move { Err(make()) })
    }

    async fn run(make: fn() -> Error) -> (RequestContext, Result<Response, Error>) {
        let ctx = RequestContext::new();
        let handler = errors().wrap(failing(make));
        let res = handler.call(ctx.clone(), Request::test(Method::GET, "/", "")).await;
        (ctx, res)
    }

    #[tokio::test]
    async fn request_errors_become_responses() {
        let (ctx, res) = run(|| RequestError::forbidden("you are not authorized for that action").into()).await;
        let res = res.unwrap();
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(res.body(), br#"{"error":"you are not authorized for that action"}"#);
        assert_eq!(ctx.status_code(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn opaque_errors_become_generic_500() {
        let (_, res) = run(|| Error::other("connection reset by peer")).await;
        let res = res.unwrap();
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.body(), br#"{"error":"Internal Server Error"}"#);
    }

    #[tokio::test]
    async fn shutdown_errors_are_recorded_and_propagated() {
        let (ctx, res) = run(|| Error::shutdown("claims missing")).await;
        assert!(res.unwrap_err().is_shutdown());
        assert_eq!(ctx.status_code(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
