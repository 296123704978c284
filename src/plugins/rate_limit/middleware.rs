//! Per-route limiter middleware.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::IntoResponse;

use crate::observability::metrics;
use crate::plugins::rate_limit::store::{MemoryStore, Verdict};
use crate::plugins::rate_limit::subject::subject_key;
use crate::routing::{HandlerFuture, Middleware, Next};

pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Applies one store's quota to every request of a route.
pub struct RateLimiter {
    store: Arc<MemoryStore>,
    limit: HeaderValue,
    route: String,
}

impl RateLimiter {
    pub fn new(store: Arc<MemoryStore>, route: impl Into<String>) -> Self {
        let limit = HeaderValue::from_str(&format!("{}/{}", store.quota(), store.period()))
            .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
        Self {
            store,
            limit,
            route: route.into(),
        }
    }

    fn set_headers(&self, headers: &mut HeaderMap, verdict: Verdict) {
        headers.insert(X_RATELIMIT_LIMIT, self.limit.clone());
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(verdict.remaining));
    }
}

impl Middleware for RateLimiter {
    fn handle(&self, req: Request<Body>, next: Next) -> HandlerFuture {
        let peer = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let Some(key) = subject_key(req.headers(), peer) else {
            tracing::warn!(route = %self.route, "Request without a valid client IP");
            return Box::pin(async {
                (StatusCode::BAD_REQUEST, "Malformed request IP detected").into_response()
            });
        };

        let verdict = self.store.is_allowed(&key);
        let mut headers = HeaderMap::new();
        self.set_headers(&mut headers, verdict);

        if !verdict.allowed {
            tracing::warn!(client = %key, route = %self.route, "Rate limit exceeded");
            metrics::record_rate_limited(&self.route);
            return Box::pin(async move {
                (StatusCode::TOO_MANY_REQUESTS, headers, "Rate limit exceeded").into_response()
            });
        }

        Box::pin(async move {
            let mut res = next.run(req).await;
            res.headers_mut().extend(headers);
            res
        })
    }

    fn name(&self) -> &'static str {
        "limiter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::rate_limit::limit::Period;
    use crate::routing::middleware::testing::echo_path;
    use crate::routing::{compose, Handler};

    fn request(real_ip: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/api/x");
        if let Some(ip) = real_ip {
            builder = builder.header("x-real-ip", ip);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("203.0.113.5:1234".parse::<SocketAddr>().unwrap()));
        req
    }

    #[tokio::test]
    async fn test_allows_then_denies() {
        let store = Arc::new(MemoryStore::new(2, Period::Second));
        let chain = compose(echo_path(), &[Arc::new(RateLimiter::new(store, "/api/*"))]);

        let first = chain.call(request(None)).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.headers()[X_RATELIMIT_LIMIT], "2/s");
        assert_eq!(first.headers()[X_RATELIMIT_REMAINING], "1");

        let second = chain.call(request(None)).await;
        assert_eq!(second.headers()[X_RATELIMIT_REMAINING], "0");

        let third = chain.call(request(None)).await;
        assert_eq!(third.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(third.headers()[X_RATELIMIT_REMAINING], "0");
        assert!(third.headers().get("x-handled").is_none());

        // another client still has its own quota
        let other = chain.call(request(Some("198.51.100.1"))).await;
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_ip_is_bad_request() {
        let store = Arc::new(MemoryStore::new(2, Period::Second));
        let chain = compose(echo_path(), &[Arc::new(RateLimiter::new(store.clone(), "/api/*"))]);

        let res = chain.call(request(Some("999.1.1.1"))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(store.is_empty());
    }
}
