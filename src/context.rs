//! Per-request identity and outcome.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use http::StatusCode;
use uuid::Uuid;

use crate::auth::Claims;

/// The record the dispatcher allocates for every inbound request.
///
/// It is passed by value to each handler and middleware in the chain. Clones
/// are handles to the same record, which is how the logging middleware sees
/// the status code the responder recorded deeper in the chain. A record is
/// never handed to a second request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    trace_id: String,
    now: DateTime<Utc>,
    started: Instant,
    // 0 until the responder records a code.
    status: AtomicU16,
    claims: OnceLock<Claims>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                trace_id: Uuid::new_v4().to_string(),
                now: Utc::now(),
                started: Instant::now(),
                status: AtomicU16::new(0),
                claims: OnceLock::new(),
            }),
        }
    }

    pub fn trace_id(&self) -> &str { &self.inner.trace_id }

    /// Wall-clock time the request was received.
    pub fn now(&self) -> DateTime<Utc> { self.inner.now }

    pub fn elapsed(&self) -> Duration { self.inner.started.elapsed() }

    /// The status code recorded by the responder, if any response was built.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self.inner.status.load(Ordering::Acquire) {
            0 => None,
            code => StatusCode::from_u16(code).ok(),
        }
    }

    pub(crate) fn set_status_code(&self, status: StatusCode) {
        self.inner.status.store(status.as_u16(), Ordering::Release);
    }

    /// Claims of the authenticated caller. `None` before authentication ran.
    pub fn claims(&self) -> Option<&Claims> { self.inner.claims.get() }

    /// Attaches verified claims. Only the first call takes effect; a later
    /// call returns its claims back as the error value.
    pub(crate) fn set_claims(&self, claims: Claims) -> Result<(), Claims> {
        self.inner.claims.set(claims)
    }
}

impl Default for RequestContext {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_contexts_have_distinct_trace_ids() {
        let a = RequestContext::new();
        let b = RequestContext::new();
        assert_ne!(a.trace_id(), b.trace_id());
        assert!(a.status_code().is_none());
        assert!(a.claims().is_none());
    }

    #[test]
    fn clones_share_the_status_code() {
        let ctx = RequestContext::new();
        let seen_by_logger = ctx.clone();
        ctx.set_status_code(StatusCode::CREATED);
        assert_eq!(seen_by_logger.status_code(), Some(StatusCode::CREATED));
    }

    #[test]
    fn claims_attach_once() {
        let ctx = RequestContext::new();
        let first = Claims::new("garrison", "alice", vec!["ADMIN".into()], Duration::from_secs(60));
        let second = Claims::new("garrison", "mallory", vec![], Duration::from_secs(60));
        assert!(ctx.set_claims(first).is_ok());
        assert!(ctx.set_claims(second).is_err());
        assert_eq!(ctx.claims().map(|c| c.sub.as_str()), Some("alice"));
    }
}
