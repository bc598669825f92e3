//! Panic recovery.

use std::any::Any;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use metrics::counter;
use tracing::error;

use crate::error::Error;
use crate::handler::{BoxedHandler, from_fn};
use crate::middleware::{BoxedMiddleware, boxed};

/// Turns a panic anywhere below this layer into an ordinary error.
///
/// The payload and a backtrace are logged; the request continues up the chain
/// as an opaque error, which the `errors` middleware answers with a 500.
/// The connection and the process keep serving.
pub fn panics() -> BoxedMiddleware {
    boxed(|next: BoxedHandler| {
        from_fn(move |ctx, req| {
            let next = Arc::clone(&next);
            async move {
                let trace_id = ctx.trace_id().to_owned();
                // The inner call happens inside the guarded future so a panic
                // raised while building the handler future is caught too.
                let guarded = AssertUnwindSafe(async move { next.call(ctx, req).await });

                match guarded.catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        counter!("http_panics_total").increment(1);
                        error!(
                            trace_id = %trace_id,
                            panic = message,
                            backtrace = %Backtrace::force_capture(),
                            "handler panicked"
                        );
                        Err(Error::other(format!("panic: {message}")))
                    }
                }
            }
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
