//! Middleware layer.
//!
//! Middleware wraps a handler in a cross-cutting concern: logging, error
//! translation, metrics, panic recovery, authentication and authorization.
//! A [`Middleware`] turns one [`BoxedHandler`] into another; a [`Chain`] is an
//! ordered list of them.
//!
//! # Order
//!
//! The first middleware in a chain is the outermost layer. It runs first on
//! the way in and last on the way out:
//!
//! ```text
//! Chain [logger, errors, metrics, panics]  +  route [authenticate, authorize]
//!
//! logger → errors → metrics → panics → authenticate → authorize → handler
//! ```
//!
//! [`App`](crate::App) always puts route middleware inside the global chain,
//! so logging and metrics observe auth failures and panic recovery covers
//! everything below it.

mod auth;
mod errors;
mod logger;
mod metrics;
mod panics;

use std::sync::Arc;

use crate::handler::BoxedHandler;

pub use auth::{authenticate, authorize};
pub use errors::errors;
pub use logger::logger;
pub use metrics::metrics;
pub use panics::panics;

/// A transform from handler to handler.
///
/// Implementations may close over shared read-only state (an
/// [`Auth`](crate::auth::Auth), a role list) but keep nothing per request.
/// Any `Fn(BoxedHandler) -> BoxedHandler` closure is a middleware.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxedHandler) -> BoxedHandler {
        self(next)
    }
}

/// A type-erased middleware that can be stored in a [`Chain`].
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Erases a middleware so it can be listed next to others.
pub fn boxed(mw: impl Middleware) -> BoxedMiddleware {
    Arc::new(mw)
}

/// An ordered list of middleware. The first entry is the outermost layer.
#[derive(Clone, Default)]
pub struct Chain {
    layers: Vec<BoxedMiddleware>,
}

impl Chain {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends a layer inside every layer already in the chain.
    pub fn with(mut self, mw: BoxedMiddleware) -> Self {
        self.layers.push(mw);
        self
    }

    /// Wraps `handler` in every layer of the chain.
    ///
    /// Layers are applied last to first, which leaves the first one outermost.
    pub fn then(&self, handler: BoxedHandler) -> BoxedHandler {
        self.layers.iter().rev().fold(handler, |next, mw| mw.wrap(next))
    }

    pub fn len(&self) -> usize { self.layers.len() }
    pub fn is_empty(&self) -> bool { self.layers.is_empty() }
}

impl FromIterator<BoxedMiddleware> for Chain {
    fn from_iter<I: IntoIterator<Item = BoxedMiddleware>>(iter: I) -> Self {
        Self { layers: iter.into_iter().collect() }
    }
}

impl IntoIterator for Chain {
    type Item = BoxedMiddleware;
    type IntoIter = std::vec::IntoIter<BoxedMiddleware>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.into_iter()
    }
}
