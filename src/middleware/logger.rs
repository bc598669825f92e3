//! Request logging.

use std::net::SocketAddr;
use std::sync::Arc;

use http::Method;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::handler::{BoxedHandler, from_fn};
use crate::middleware::{BoxedMiddleware, boxed};

/// Logs one event when a request enters the chain and one when it leaves,
/// with the status code the responder recorded and the time taken.
///
/// Place it first so the status it reports is the one that went on the wire.
/// A request dropped before it finished (timeout, client gone) is logged as
/// `request cancelled` instead.
pub fn logger() -> BoxedMiddleware {
    boxed(|next: BoxedHandler| {
        from_fn(move |ctx, req| {
            let next = Arc::clone(&next);
            async move {
                let mut entry = Entry {
                    ctx: ctx.clone(),
                    method: req.method().clone(),
                    path: req.path().to_owned(),
                    remote_addr: req.remote_addr(),
                    finished: false,
                };

                info!(
                    trace_id = ctx.trace_id(),
                    method = %entry.method,
                    path = %entry.path,
                    remote_addr = ?entry.remote_addr,
                    "request started"
                );

                let result = next.call(ctx, req).await;
                entry.finished = true;
                result
            }
        })
    })
}

/// Emits the closing event when dropped.
struct Entry {
    ctx: RequestContext,
    method: Method,
    path: String,
    remote_addr: Option<SocketAddr>,
    finished: bool,
}

impl Drop for Entry {
    fn drop(&mut self) {
        let status = self.ctx.status_code().map_or(0, |s| s.as_u16());
        if self.finished {
            info!(
                trace_id = self.ctx.trace_id(),
                method = %self.method,
                path = %self.path,
                remote_addr = ?self.remote_addr,
                status,
                elapsed = ?self.ctx.elapsed(),
                "request completed"
            );
        } else {
            warn!(
                trace_id = self.ctx.trace_id(),
                method = %self.method,
                path = %self.path,
                remote_addr = ?self.remote_addr,
                elapsed = ?self.ctx.elapsed(),
                "request cancelled"
            );
        }
    }
}
