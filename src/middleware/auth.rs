//! Authentication and authorization middleware.

use std::sync::Arc;

use http::StatusCode;
use http::header::AUTHORIZATION;
use tracing::warn;

use crate::auth::Auth;
use crate::error::{Error, RequestError};
use crate::handler::{BoxedHandler, from_fn};
use crate::middleware::{BoxedMiddleware, boxed};
use crate::request::Request;

const BEARER_FORMAT: &str = "expected authorization header format: Bearer <token>";

/// Requires a valid bearer token and attaches its claims to the context.
///
/// Every failure is a 401 with a fixed message; the precise reason is only
/// logged.
pub fn authenticate(auth: Arc<Auth>) -> BoxedMiddleware {
    boxed(move |next: BoxedHandler| {
        let auth = Arc::clone(&auth);
        from_fn(move |ctx, req| {
            let next = Arc::clone(&next);
            let auth = Arc::clone(&auth);
            async move {
                let Some(token) = bearer_token(&req) else {
                    return Err(RequestError::unauthorized(BEARER_FORMAT).into());
                };

                let claims = match auth.validate_token(token) {
                    Ok(claims) => claims,
                    Err(err) => {
                        warn!(trace_id = ctx.trace_id(), error = %err, "token rejected");
                        let message = StatusCode::UNAUTHORIZED.canonical_reason().unwrap_or("Unauthorized");
                        return Err(RequestError::unauthorized(message).with_source(err).into());
                    }
                };

                if ctx.set_claims(claims).is_err() {
                    warn!(trace_id = ctx.trace_id(), "claims already attached, keeping the first");
                }

                next.call(ctx, req).await
            }
        })
    })
}

/// Lets the request through only if its claims hold at least one of `roles`.
///
/// Must sit inside [`authenticate`]. Reaching it without claims means the
/// route was wired wrong, which is reported as a shutdown error.
pub fn authorize<I, S>(roles: I) -> BoxedMiddleware
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let roles: Arc<[String]> = roles.into_iter().map(Into::into).collect();

    boxed(move |next: BoxedHandler| {
        let roles = Arc::clone(&roles);
        from_fn(move |ctx, req| {
            let next = Arc::clone(&next);
            let roles = Arc::clone(&roles);
            async move {
                let Some(claims) = ctx.claims() else {
                    return Err(Error::shutdown("claims missing from request context"));
                };

                if !claims.authorized(&roles[..]) {
                    return Err(RequestError::forbidden("you are not authorized for that action").into());
                }

                next.call(ctx, req).await
            }
        })
    })
}

/// Extracts `<token>` from `Authorization: Bearer <token>`. The scheme is
/// case-insensitive; anything other than exactly two space-separated parts
/// is rejected.
fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.header(AUTHORIZATION.as_str())?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Some(token)
        }
        _ => None,
    }
}
