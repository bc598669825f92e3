//! Handler trait and type erasure.
//!
//! # The handler contract
//!
//! A handler receives the request's [`RequestContext`] and the [`Request`]
//! and either returns a response or returns an [`Error`]. Never both: a
//! handler that has an error has not produced any bytes.
//!
//! ```text
//! async fn readiness(ctx: RequestContext, req: Request) -> Result<Response, Error>
//! ```
//!
//! # How handlers are stored
//!
//! Routes and middleware layers hold handlers of different concrete types, so
//! each is erased behind [`ErasedHandler`] and shared as a [`BoxedHandler`]:
//!
//! ```text
//! async fn readiness(…) -> Result<Response, Error>   ← user writes this
//!        ↓ app.handle(Method::GET, "/readiness", readiness, …)
//! readiness.into_boxed_handler()                     ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(readiness))                     ← BoxedHandler
//!        ↓ each middleware layer wraps the previous BoxedHandler
//! handler.call(ctx, req) at request time             ← one vtable call per layer
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::Error;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased handler future.
pub type BoxFuture = Pin<Box<dyn Future<Output = Result<Response, Error>> + Send + 'static>>;

/// Object-safe dispatch interface every layer of a chain implements.
pub trait ErasedHandler: Send + Sync + 'static {
    fn call(&self, ctx: RequestContext, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// Automatically satisfied for any `async fn` (or closure) with the shape
/// `Fn(RequestContext, Request) -> impl Future<Output = Result<R, Error>>`
/// where `R: IntoResponse`. Sealed: only the blanket impl provides it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Erases a closure into a [`BoxedHandler`].
///
/// This is how middleware builds the handler it returns: the closure
/// parameter types are inferred here, which a bare `.into_boxed_handler()`
/// call on a closure literal cannot do.
pub fn from_fn<F, Fut>(f: F) -> BoxedHandler
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Error>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(RequestContext, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, Error>> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, ctx: RequestContext, req: Request) -> BoxFuture {
        // Responses built without `respond` still get their status recorded.
        let recorder = ctx.clone();
        let fut = (self.0)(ctx, req);
        Box::pin(async move {
            let res = fut.await?.into_response();
            recorder.set_status_code(res.status);
            Ok(res)
        })
    }
}
