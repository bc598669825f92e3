//! Kubernetes probe handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/liveness` | Is the process alive? Failure → restart. |
//! | **Readiness** | `/readiness` | Can the pod serve traffic? Failure → pulled from the load balancer. |
//!
//! Readiness asks the database through a [`StatusCheck`]; liveness has no
//! dependencies at all.

use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use serde::Serialize;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::context::RequestContext;
use crate::error::{BoxError, Error};
use crate::request::Request;
use crate::response::{Response, respond};

/// Asks whether a dependency is ready to take traffic.
#[async_trait::async_trait]
pub trait StatusCheck: Send + Sync {
    async fn status_check(&self) -> Result<(), BoxError>;
}

/// Reports ready when a TCP connection to `addr` opens within `timeout`.
#[derive(Debug, Clone)]
pub struct TcpStatusCheck {
    addr: String,
    timeout: Duration,
}

impl TcpStatusCheck {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self { addr: addr.into(), timeout }
    }
}

#[async_trait::async_trait]
impl StatusCheck for TcpStatusCheck {
    async fn status_check(&self) -> Result<(), BoxError> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr.as_str())).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => {
                debug!(addr = %self.addr, "status check failed: {e}");
                Err(e.into())
            }
            Err(_) => {
                debug!(addr = %self.addr, timeout = ?self.timeout, "status check timed out");
                Err(format!("no answer from {} within {:?}", self.addr, self.timeout).into())
            }
        }
    }
}

#[derive(Serialize)]
struct Status {
    status: &'static str,
}

/// `200 {"status":"ok"}` while the database answers, otherwise
/// `500 {"status":"db not ready"}`. An unready database is a normal answer
/// here, not an error.
pub async fn readiness(db: Arc<dyn StatusCheck>, ctx: RequestContext) -> Result<Response, Error> {
    let (status, code) = match db.status_check().await {
        Ok(()) => ("ok", StatusCode::OK),
        Err(e) => {
            info!(trace_id = ctx.trace_id(), error = %e, "database not ready");
            ("db not ready", StatusCode::INTERNAL_SERVER_ERROR)
        }
    };

    info!(trace_id = ctx.trace_id(), status, "readiness");
    respond(&ctx, &Status { status }, code)
}

/// Always `200 {"status":"ok"}`. If the process can answer at all it is alive.
pub async fn liveness(ctx: RequestContext, _req: Request) -> Result<Response, Error> {
    respond(&ctx, &Status { status: "ok" }, StatusCode::OK)
}
