//! HTTP server and graceful shutdown.
//!
//! Shutdown starts on the first of SIGTERM, Ctrl-C, or a [`Shutdown`] signal
//! raised from inside a request. The server then:
//!
//! 1. Stops calling `listener.accept()`; no new connections are made.
//! 2. Tells every open connection to finish its in-flight request and close.
//! 3. Waits up to the grace period for those connections to drain.
//! 4. Aborts whatever is still running once the grace period has elapsed and
//!    reports it as [`ServerError::GracePeriodElapsed`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::app::App;
use crate::context::RequestContext;
use crate::error::{Error, RequestError};
use crate::response::{fallback_internal_error, respond_error};
use crate::shutdown::Shutdown;

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Failures of the server itself, as opposed to failures of a request.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("connections still open after the {0:?} grace period")]
    GracePeriodElapsed(Duration),
}

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    shutdown: Shutdown,
    grace_period: Duration,
    request_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    pub fn bind(addr: SocketAddr) -> Self {
        Self {
            addr,
            shutdown: Shutdown::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Also stop when `shutdown` is signalled. Pass the handle the [`App`]
    /// was built with so shutdown-class errors stop the server.
    pub fn shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// How long in-flight connections get to finish once shutdown starts.
    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Longest a single request may run before it is answered with `503`.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Starts accepting connections and dispatching them through `app`.
    ///
    /// Returns after a full graceful shutdown.
    pub async fn serve(self, app: App) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.addr).await?;
        let app = Arc::new(app);

        info!(addr = %self.addr, "api listening");

        let mut tasks = JoinSet::new();
        // Flipped once shutdown starts; every connection task watches it.
        let (drain_tx, drain_rx) = watch::channel(false);

        let stop = stop_signal(self.shutdown.clone());
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;

                () = &mut stop => {
                    info!(in_flight = tasks.len(), "shutdown started, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let mut drain = drain_rx.clone();
                    let timeout = self.request_timeout;
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move {
                                let res = serve_one(&app, req, remote_addr, timeout).await;
                                Ok::<_, std::convert::Infallible>(res)
                            }
                        });

                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(io, svc);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            res = conn.as_mut() => res,
                            // The watch guard must be gone before the drain is awaited.
                            () = async { let _ = drain.wait_for(|draining| *draining).await; } => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };

                        if let Err(e) = result {
                            warn!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        drop(listener);
        drain_tx.send_replace(true);

        let drained = tokio::time::timeout(self.grace_period, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(remaining = tasks.len(), grace_period = ?self.grace_period, "grace period elapsed, closing connections");
            tasks.abort_all();
            return Err(ServerError::GracePeriodElapsed(self.grace_period));
        }

        info!("api stopped");
        Ok(())
    }
}

/// Dispatches one request, bounded by `timeout`.
async fn serve_one(
    app: &App,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
    timeout: Duration,
) -> http::Response<http_body_util::Full<bytes::Bytes>> {
    let ctx = RequestContext::new();
    match tokio::time::timeout(timeout, app.dispatch_in(ctx.clone(), req, Some(remote_addr))).await {
        Ok(res) => res.into_inner(),
        Err(_) => {
            warn!(trace_id = ctx.trace_id(), peer = %remote_addr, ?timeout, "request timed out");
            let err: Error = RequestError::new(StatusCode::SERVICE_UNAVAILABLE, "request timed out").into();
            respond_error(&ctx, &err)
                .unwrap_or_else(|_| fallback_internal_error(&ctx))
                .into_inner()
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first shutdown request: SIGTERM, SIGINT, or `shutdown`.
async fn stop_signal(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!(signal = "SIGINT", "shutdown requested"),
        () = sigterm => info!(signal = "SIGTERM", "shutdown requested"),
        () = shutdown.wait() => info!(signal = "internal", "shutdown requested"),
    }
}
