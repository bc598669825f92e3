//! The application: route table, global middleware and per-request dispatch.

use std::net::SocketAddr;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Body;
use tracing::error;

use crate::context::RequestContext;
use crate::error::{Error, RequestError};
use crate::handler::Handler;
use crate::middleware::{BoxedMiddleware, Chain};
use crate::request::Request;
use crate::response::{Response, fallback_internal_error, respond_error};
use crate::router::{Lookup, Router};
use crate::shutdown::Shutdown;

/// Binds verb + path to fully wrapped handlers.
///
/// Build it once at startup and hand it to [`Server::serve`](crate::Server::serve).
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use garrison::{App, Error, Request, RequestContext, Response, Shutdown, respond};
/// use garrison::auth::{Auth, ROLE_ADMIN};
/// use garrison::middleware::{self, Chain};
/// use http::{Method, StatusCode};
///
/// # fn build(auth: Arc<Auth>) -> App {
/// let global = Chain::new()
///     .with(middleware::logger())
///     .with(middleware::errors())
///     .with(middleware::metrics())
///     .with(middleware::panics());
///
/// App::new(Shutdown::new(), global).handle(
///     Method::GET,
///     "/readiness",
///     readiness,
///     [middleware::authenticate(auth), middleware::authorize([ROLE_ADMIN])],
/// )
/// # }
///
/// async fn readiness(ctx: RequestContext, _req: Request) -> Result<Response, Error> {
///     respond(&ctx, &serde_json::json!({"status": "ok"}), StatusCode::OK)
/// }
/// ```
pub struct App {
    router: Router,
    global: Chain,
    shutdown: Shutdown,
}

impl App {
    /// Creates an app whose every route is wrapped in `global`, first entry
    /// outermost.
    pub fn new(shutdown: Shutdown, global: impl IntoIterator<Item = BoxedMiddleware>) -> Self {
        Self { router: Router::default(), global: global.into_iter().collect(), shutdown }
    }

    /// Registers `handler` for `method` + `path`.
    ///
    /// The handler is wrapped in `route` first (first entry outermost, so
    /// `[authenticate, authorize]` authenticates before it authorizes) and
    /// then in the global chain. Path parameters use `{name}` syntax.
    ///
    /// # Panics
    ///
    /// Panics if `path` is invalid or already registered for `method`.
    pub fn handle(
        mut self,
        method: Method,
        path: &str,
        handler: impl Handler,
        route: impl IntoIterator<Item = BoxedMiddleware>,
    ) -> Self {
        let route: Chain = route.into_iter().collect();
        let wrapped = self.global.then(route.then(handler.into_boxed_handler()));
        self.router.insert(method, path, wrapped);
        self
    }

    /// The handle this app signals when a request fails with a shutdown error.
    pub fn shutdown(&self) -> &Shutdown { &self.shutdown }

    /// Requests graceful termination of the process.
    pub fn signal_shutdown(&self) {
        self.shutdown.signal();
    }

    /// Runs one request through the route table and returns its response.
    ///
    /// A fresh [`RequestContext`] is allocated for every call. Errors are
    /// expected to have been answered by the `errors` middleware; one that
    /// gets here anyway is logged, answered with a generic 500 and, if it is a
    /// shutdown error, signals shutdown.
    pub async fn dispatch<B>(&self, req: http::Request<B>, remote_addr: Option<SocketAddr>) -> Response
    where
        B: Body<Data = Bytes>,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        self.dispatch_in(RequestContext::new(), req, remote_addr).await
    }

    /// [`dispatch`](App::dispatch) with a context the caller keeps a handle
    /// to, so it can still answer if it abandons the request.
    pub(crate) async fn dispatch_in<B>(
        &self,
        ctx: RequestContext,
        req: http::Request<B>,
        remote_addr: Option<SocketAddr>,
    ) -> Response
    where
        B: Body<Data = Bytes>,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let (parts, body) = req.into_parts();
        let path = parts.uri.path().to_owned();

        let (handler, params) = match self.router.lookup(&parts.method, &path) {
            Lookup::Found(handler, params) => (handler, params),
            Lookup::MethodNotAllowed => return self.reject(&ctx, StatusCode::METHOD_NOT_ALLOWED),
            Lookup::NotFound => return self.reject(&ctx, StatusCode::NOT_FOUND),
        };

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let err = RequestError::bad_request("unable to read request body").with_source(e);
                return self.answer(&ctx, &err.into());
            }
        };

        let req = Request::new(parts.method, path, parts.headers, body, params, remote_addr);

        match handler.call(ctx.clone(), req).await {
            Ok(res) => res,
            Err(err) => {
                if err.is_shutdown() {
                    error!(trace_id = ctx.trace_id(), error = %err, "shutdown requested by handler chain");
                    self.signal_shutdown();
                } else {
                    error!(trace_id = ctx.trace_id(), error = %err, "error reached the dispatcher unhandled");
                }
                self.answer(&ctx, &Error::other(err.to_string()))
            }
        }
    }

    fn reject(&self, ctx: &RequestContext, status: StatusCode) -> Response {
        let message = status.canonical_reason().unwrap_or("");
        self.answer(ctx, &RequestError::new(status, message).into())
    }

    fn answer(&self, ctx: &RequestContext, err: &Error) -> Response {
        respond_error(ctx, err).unwrap_or_else(|_| fallback_internal_error(ctx))
    }
}

