//! Handler and middleware primitives.
//!
//! A [`Handler`] turns a request into a response. A [`Middleware`] wraps the
//! rest of the chain and decides whether (and how) to call it through
//! [`Next`]. Chains are composed once, at registration time, so dispatch is
//! a plain walk through pre-built `Arc`s.

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures_util::future::BoxFuture;

/// Future returned by every handler in the chain.
pub type HandlerFuture = BoxFuture<'static, Response>;

/// Terminal request handler (reverse proxy, static responder, ...).
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request<Body>) -> HandlerFuture;
}

/// Shared, type-erased handler.
pub type BoxHandler = Arc<dyn Handler>;

/// Request-handling wrapper applied before the final handler.
pub trait Middleware: Send + Sync + 'static {
    /// Handle the request, optionally delegating to `next`.
    fn handle(&self, req: Request<Body>, next: Next) -> HandlerFuture;

    /// Short name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Shared, type-erased middleware.
pub type BoxMiddleware = Arc<dyn Middleware>;

/// The remainder of a middleware chain.
#[derive(Clone)]
pub struct Next {
    inner: BoxHandler,
}

impl Next {
    /// Run the rest of the chain.
    pub fn run(self, req: Request<Body>) -> HandlerFuture {
        self.inner.call(req)
    }
}

struct Layered {
    middleware: BoxMiddleware,
    next: BoxHandler,
}

impl Handler for Layered {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        self.middleware.handle(
            req,
            Next {
                inner: self.next.clone(),
            },
        )
    }
}

/// Wrap `handler` so that `middlewares[0]` is the outermost layer.
pub fn compose(handler: BoxHandler, middlewares: &[BoxMiddleware]) -> BoxHandler {
    middlewares.iter().rev().fold(handler, |next, middleware| {
        Arc::new(Layered {
            middleware: middleware.clone(),
            next,
        })
    })
}

/// Adapter turning an async closure into a [`Handler`].
pub struct HandlerFn<F>(F);

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        Box::pin((self.0)(req))
    }
}

pub fn handler_fn<F, Fut>(f: F) -> BoxHandler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(HandlerFn(f))
}

/// Adapter turning an async closure into a [`Middleware`].
pub struct MiddlewareFn<F> {
    name: &'static str,
    f: F,
}

impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, req: Request<Body>, next: Next) -> HandlerFuture {
        Box::pin((self.f)(req, next))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

pub fn middleware_fn<F, Fut>(name: &'static str, f: F) -> BoxMiddleware
where
    F: Fn(Request<Body>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(MiddlewareFn { name, f })
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers shared by routing and plugin tests.

    use super::*;
    use axum::http::HeaderValue;
    use std::sync::Mutex;

    /// Middleware that records its name on the way in and on the way out.
    pub fn tracing_middleware(label: &'static str, log: Arc<Mutex<Vec<String>>>) -> BoxMiddleware {
        middleware_fn(label, move |req, next: Next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{label}:in"));
                let res = next.run(req).await;
                log.lock().unwrap().push(format!("{label}:out"));
                res
            }
        })
    }

    /// Handler that answers 200 with the request path as body.
    pub fn echo_path() -> BoxHandler {
        handler_fn(|req: Request<Body>| async move {
            let mut res = Response::new(Body::from(req.uri().path().to_string()));
            res.headers_mut()
                .insert("x-handled", HeaderValue::from_static("true"));
            res
        })
    }

    pub async fn body_string(res: Response) -> String {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_first_middleware_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = compose(
            echo_path(),
            &[
                tracing_middleware("a", log.clone()),
                tracing_middleware("b", log.clone()),
            ],
        );

        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        let res = chain.call(req).await;

        assert_eq!(body_string(res).await, "/x");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:in", "b:in", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let reached = Arc::new(Mutex::new(false));
        let flag = reached.clone();
        let handler = handler_fn(move |_req| {
            let flag = flag.clone();
            async move {
                *flag.lock().unwrap() = true;
                Response::new(Body::empty())
            }
        });
        let deny = middleware_fn("deny", |_req, _next| async {
            let mut res = Response::new(Body::empty());
            *res.status_mut() = axum::http::StatusCode::FORBIDDEN;
            res
        });

        let chain = compose(handler, &[deny]);
        let res = chain
            .call(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await;

        assert_eq!(res.status(), axum::http::StatusCode::FORBIDDEN);
        assert!(!*reached.lock().unwrap());
    }
}
