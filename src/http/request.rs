//! Request tagging.
//!
//! # Responsibilities
//! - Assign a unique request ID (UUID v4) to every inbound request
//! - Keep upstream-supplied IDs: a new ID is appended, never substituted
//! - Echo the final ID on the response and expose it to later middleware
//!
//! # Design Decisions
//! - Registered as the first global middleware so every later layer (and the
//!   access log) can see the ID
//! - The raw header bytes are preserved when appending

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use uuid::Uuid;

use crate::routing::{HandlerFuture, Middleware, Next};

/// Header carrying the request ID, both directions.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID stored in request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access the request ID assigned by [`RequestIdMiddleware`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

/// Build the outgoing ID: a fresh UUID, appended (comma separated) to an
/// already present value.
fn next_request_id(existing: Option<&HeaderValue>) -> HeaderValue {
    let fresh = Uuid::new_v4().to_string();
    match existing {
        Some(value) if !value.is_empty() => {
            let mut bytes = value.as_bytes().to_vec();
            bytes.push(b',');
            bytes.extend_from_slice(fresh.as_bytes());
            HeaderValue::from_bytes(&bytes).unwrap_or_else(|_| fresh_header(&fresh))
        }
        _ => fresh_header(&fresh),
    }
}

fn fresh_header(id: &str) -> HeaderValue {
    // a hyphenated UUID is always a valid header value
    HeaderValue::from_str(id).unwrap_or_else(|_| HeaderValue::from_static("invalid-request-id"))
}

/// Middleware adding `X-Request-ID` to every request and response.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdMiddleware;

impl Middleware for RequestIdMiddleware {
    fn handle(&self, mut req: Request<Body>, next: Next) -> HandlerFuture {
        let value = next_request_id(req.headers().get(X_REQUEST_ID));
        let id = RequestId(String::from_utf8_lossy(value.as_bytes()).into_owned());

        req.headers_mut().insert(X_REQUEST_ID, value.clone());
        req.extensions_mut().insert(id);

        Box::pin(async move {
            let mut res = next.run(req).await;
            res.headers_mut().insert(X_REQUEST_ID, value);
            res
        })
    }

    fn name(&self) -> &'static str {
        "request_id"
    }
}
