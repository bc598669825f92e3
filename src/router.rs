//! Verb + path dispatch table.
//!
//! One radix tree per HTTP method, delegated to [`matchit`]. The router only
//! stores fully wrapped handlers; composition happens in [`App`](crate::App).

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::BoxedHandler;

pub(crate) enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    /// The path exists, but not for this method.
    MethodNotAllowed,
    NotFound,
}

#[derive(Default)]
pub(crate) struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

impl Router {
    /// Registers `handler` for `method` + `path`.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or collides with a route
    /// already registered for the same method. Routes are fixed at startup,
    /// so this is a programming error.
    pub(crate) fn insert(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Lookup {
        if let Some(matched) = self.routes.get(method).and_then(|tree| tree.at(path).ok()) {
            let params = matched
                .params
                .iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Lookup::Found(Arc::clone(matched.value), params);
        }

        let elsewhere = self
            .routes
            .iter()
            .any(|(m, tree)| m != method && tree.at(path).is_ok());
        if elsewhere { Lookup::MethodNotAllowed } else { Lookup::NotFound }
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::handler::from_fn;
    use crate::response::Response;

    fn noop() -> BoxedHandler {
        from_fn(|_ctx, _req| async move { Ok(Response::status(StatusCode::OK)) })
    }

    #[test]
    fn lookup_outcomes() {
        let mut router = Router::default();
        router.insert(Method::GET, "/users/{id}", noop());

        match router.lookup(&Method::GET, "/users/42") {
            Lookup::Found(_, params) => assert_eq!(params.get("id").map(String::as_str), Some("42")),
            _ => panic!("expected a match"),
        }
        assert!(matches!(router.lookup(&Method::DELETE, "/users/42"), Lookup::MethodNotAllowed));
        assert!(matches!(router.lookup(&Method::GET, "/orders"), Lookup::NotFound));
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let mut router = Router::default();
        router.insert(Method::GET, "/users/{id}", noop());
        router.insert(Method::GET, "/users/{name}", noop());
    }
}
