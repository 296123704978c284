//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes (handler already wrapped in its middleware chain)
//! - Look up the matching route for a request path
//! - Return the matched handler, a trailing-slash redirect, or 404
//!
//! # Design Decisions
//! - Global middleware is captured when a path is registered; routes added
//!   before a `use_middleware` call do not get it retroactively
//! - The route table is swapped atomically, so paths can be registered while
//!   the server is already serving (lookups never block)
//! - Exact patterns beat subtree patterns; the longest subtree wins

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::routing::matcher::PathPattern;
use crate::routing::middleware::{compose, BoxHandler, BoxMiddleware, Handler, HandlerFuture};

/// Errors returned when registering a path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error("invalid pattern `{0}`: must start with `/`")]
    InvalidPattern(String),

    #[error("multiple registrations for `{0}`")]
    DuplicatePattern(String),
}

#[derive(Clone, Default)]
struct RouteTable {
    exact: HashMap<String, BoxHandler>,
    /// Sorted by specificity, longest first.
    subtrees: Vec<(PathPattern, BoxHandler)>,
}

enum Lookup {
    Found(BoxHandler),
    Redirect(String),
    NotFound,
}

impl RouteTable {
    fn contains(&self, pattern: &str) -> bool {
        self.exact.contains_key(pattern)
            || self.subtrees.iter().any(|(p, _)| p.as_str() == pattern)
    }

    fn insert(&mut self, pattern: PathPattern, handler: BoxHandler) {
        match pattern {
            PathPattern::Exact(path) => {
                self.exact.insert(path, handler);
            }
            subtree @ PathPattern::Subtree(_) => {
                self.subtrees.push((subtree, handler));
                self.subtrees
                    .sort_by(|(a, _), (b, _)| b.specificity().cmp(&a.specificity()));
            }
        }
    }

    fn lookup(&self, path: &str) -> Lookup {
        if let Some(handler) = self.exact.get(path) {
            return Lookup::Found(handler.clone());
        }

        // "/api" with only "/api/" registered: send the client to the subtree root
        if !path.ends_with('/') && !self.contains(path) {
            let with_slash = format!("{}/", path);
            if self.contains(&with_slash) {
                return Lookup::Redirect(with_slash);
            }
        }

        self.subtrees
            .iter()
            .find(|(pattern, _)| pattern.matches(path))
            .map(|(_, handler)| Lookup::Found(handler.clone()))
            .unwrap_or(Lookup::NotFound)
    }
}

/// Path-based dispatch table with global and per-route middleware.
pub struct Router {
    global: Vec<BoxMiddleware>,
    table: ArcSwap<RouteTable>,
    writer: Mutex<()>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            global: Vec::new(),
            table: ArcSwap::from_pointee(RouteTable::default()),
            writer: Mutex::new(()),
        }
    }

    /// Append global middleware, applied to every path registered afterwards.
    pub fn use_middleware(&mut self, middleware: BoxMiddleware) {
        tracing::debug!(middleware = middleware.name(), "Global middleware added");
        self.global.push(middleware);
    }

    /// Number of global middleware currently configured.
    pub fn global_middleware_count(&self) -> usize {
        self.global.len()
    }

    /// Install `handler` at `path`, wrapped by the global middleware (in
    /// `use_middleware` order) followed by `route_middleware`.
    pub fn register_path(
        &self,
        path: &str,
        handler: BoxHandler,
        route_middleware: &[BoxMiddleware],
    ) -> Result<(), RouterError> {
        if !path.starts_with('/') {
            return Err(RouterError::InvalidPattern(path.to_string()));
        }

        let _guard = self.writer.lock().expect("router writer lock poisoned");
        let current = self.table.load();
        if current.contains(path) {
            return Err(RouterError::DuplicatePattern(path.to_string()));
        }

        let chain: Vec<BoxMiddleware> = self
            .global
            .iter()
            .chain(route_middleware.iter())
            .cloned()
            .collect();
        let composed = compose(handler, &chain);

        let mut next = RouteTable::clone(&current);
        next.insert(PathPattern::parse(path), composed);
        self.table.store(Arc::new(next));

        tracing::debug!(
            path = %path,
            global_middlewares = self.global.len(),
            local_middlewares = route_middleware.len(),
            "Path registered"
        );
        Ok(())
    }

    /// Registered patterns, exact ones first, subtrees longest first.
    pub fn patterns(&self) -> Vec<String> {
        let table = self.table.load();
        let mut exact: Vec<String> = table.exact.keys().cloned().collect();
        exact.sort();
        exact
            .into_iter()
            .chain(table.subtrees.iter().map(|(p, _)| p.as_str().to_string()))
            .collect()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for Router {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        let lookup = self.table.load().lookup(req.uri().path());
        match lookup {
            Lookup::Found(handler) => handler.call(req),
            Lookup::Redirect(path) => {
                let location = match req.uri().query() {
                    Some(query) => format!("{}?{}", path, query),
                    None => path,
                };
                Box::pin(async move { redirect(&location) })
            }
            Lookup::NotFound => {
                tracing::debug!(path = %req.uri().path(), "No route matched");
                Box::pin(async { (StatusCode::NOT_FOUND, "404 page not found\n").into_response() })
            }
        }
    }
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (
            StatusCode::MOVED_PERMANENTLY,
            [(header::LOCATION, value)],
            "Moved Permanently\n",
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "404 page not found\n").into_response(),
    }
}
