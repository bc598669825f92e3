//! The sales service's route table.

mod check;

use std::sync::Arc;

use http::Method;

pub use check::{StatusCheck, TcpStatusCheck, liveness, readiness};

use crate::app::App;
use crate::auth::{Auth, ROLE_ADMIN};
use crate::context::RequestContext;
use crate::middleware::{self, Chain};
use crate::request::Request;
use crate::shutdown::Shutdown;

/// Builds the service's [`App`].
///
/// Every route runs inside logger, errors, metrics and panics, in that order.
/// `/readiness` additionally requires an admin token.
pub fn api(shutdown: Shutdown, auth: Arc<Auth>, db: Arc<dyn StatusCheck>) -> App {
    let global = Chain::new()
        .with(middleware::logger())
        .with(middleware::errors())
        .with(middleware::metrics())
        .with(middleware::panics());

    App::new(shutdown, global)
        .handle(
            Method::GET,
            "/readiness",
            move |ctx: RequestContext, _req: Request| {
                let db = Arc::clone(&db);
                async move { readiness(db, ctx).await }
            },
            Chain::new()
                .with(middleware::authenticate(auth))
                .with(middleware::authorize([ROLE_ADMIN])),
        )
        .handle(Method::GET, "/liveness", liveness, Chain::new())
}
