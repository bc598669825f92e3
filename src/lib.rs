//! # garrison
//!
//! The request-handling core of a small JSON service.
//!
//! ## The contract
//!
//! A request enters the [`App`], gets a fresh [`RequestContext`], and runs
//! through the global middleware, then the route's middleware, then the
//! handler. A handler either returns a [`Response`] or an [`Error`]; never
//! both. Errors are turned into responses in exactly one place, the
//! [`errors`](middleware::errors) middleware, so handlers never write error
//! bodies themselves.
//!
//! What the crate provides:
//!
//! - Composable middleware ([`middleware::Chain`]), first entry outermost
//! - Strict JSON decoding with declarative validation ([`Decoder`])
//! - An error taxonomy that keeps internal details away from clients ([`Error`])
//! - Signed bearer tokens with key rotation by key id ([`auth`])
//! - Graceful shutdown on SIGTERM, Ctrl-C or an in-process request ([`Shutdown`])
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::net::SocketAddr;
//!
//! use garrison::{App, Error, Request, RequestContext, Response, Server, Shutdown, respond};
//! use garrison::middleware::{self, Chain};
//! use http::{Method, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let shutdown = Shutdown::new();
//!     let global = Chain::new()
//!         .with(middleware::logger())
//!         .with(middleware::errors())
//!         .with(middleware::panics());
//!
//!     let app = App::new(shutdown.clone(), global)
//!         .handle(Method::GET, "/users/{id}", get_user, Chain::new());
//!
//!     let addr: SocketAddr = "0.0.0.0:3000".parse()?;
//!     Server::bind(addr).shutdown(shutdown).serve(app).await?;
//!     Ok(())
//! }
//!
//! async fn get_user(ctx: RequestContext, req: Request) -> Result<Response, Error> {
//!     let id = req.param("id").unwrap_or("unknown");
//!     respond(&ctx, &serde_json::json!({ "id": id }), StatusCode::OK)
//! }
//! ```

mod app;
mod context;
mod decode;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod shutdown;

pub mod auth;
pub mod config;
pub mod handlers;
pub mod middleware;

pub use app::App;
pub use context::RequestContext;
pub use decode::{Decoder, FieldNames, Translator};
pub use error::{BoxError, Error, FieldError, RequestError};
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, from_fn};
pub use request::Request;
pub use response::{ErrorResponse, IntoResponse, Response, respond, respond_error};
pub use server::{Server, ServerError};
pub use shutdown::Shutdown;
