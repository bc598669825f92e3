//! Request metrics.

use std::sync::Arc;

use metrics::{counter, gauge, histogram};

use crate::context::RequestContext;
use crate::handler::{BoxedHandler, from_fn};
use crate::middleware::{BoxedMiddleware, boxed};

/// Counts requests and errors, tracks in-flight requests and records latency
/// through the [`metrics`] facade. With no recorder installed the calls are
/// no-ops.
///
/// | Metric | Type |
/// |---|---|
/// | `http_requests_total` | counter |
/// | `http_errors_total` | counter |
/// | `http_requests_in_flight` | gauge |
/// | `http_request_duration_seconds` | histogram |
///
/// A request abandoned mid-flight (timeout, client gone) still leaves the
/// in-flight gauge and records its duration.
pub fn metrics() -> BoxedMiddleware {
    boxed(|next: BoxedHandler| {
        from_fn(move |ctx, req| {
            let next = Arc::clone(&next);
            async move {
                let in_flight = InFlight::enter(ctx.clone());

                let result = next.call(ctx, req).await;

                if result.is_err() {
                    counter!("http_errors_total").increment(1);
                }
                drop(in_flight);

                result
            }
        })
    })
}

/// Held while a request is below this layer. Dropping it, normally or by
/// cancellation, closes the request's bookkeeping.
struct InFlight {
    ctx: RequestContext,
}

impl InFlight {
    fn enter(ctx: RequestContext) -> Self {
        counter!("http_requests_total").increment(1);
        gauge!("http_requests_in_flight").increment(1.0);
        Self { ctx }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        gauge!("http_requests_in_flight").decrement(1.0);
        histogram!("http_request_duration_seconds").record(self.ctx.elapsed().as_secs_f64());
    }
}
