//! Reverse proxy handler.
//!
//! # Responsibilities
//! - Rewrite the request through the route's [`Director`]
//! - Forward it with the shared upstream client
//! - Stream the upstream response back
//! - Answer 502 when no upstream can be reached

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, Version};
use axum::response::{IntoResponse, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;

use crate::http::request::RequestId;
use crate::observability::metrics;
use crate::proxy::director::Director;
use crate::routing::{Handler, HandlerFuture};
use crate::security::headers::{append_forwarded_for, strip_hop_by_hop};

/// Client shared by every proxied route.
pub type HttpClient = Client<HttpConnector, Body>;

pub fn http_client() -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Terminal handler forwarding requests to the route's upstreams.
pub struct ReverseProxy {
    director: Director,
    client: HttpClient,
}

impl ReverseProxy {
    pub fn new(director: Director, client: HttpClient) -> Self {
        Self { director, client }
    }
}

fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Bad Gateway\n").into_response()
}

impl Handler for ReverseProxy {
    fn call(&self, req: Request<Body>) -> HandlerFuture {
        let start = Instant::now();
        let (mut parts, body) = req.into_parts();
        let method = parts.method.to_string();
        let request_id = parts
            .extensions
            .get::<RequestId>()
            .map(|id| id.to_string())
            .unwrap_or_default();

        let upstream = match self.director.direct(&mut parts) {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    listen_path = %self.director.route().listen_path,
                    error = %e,
                    "Could not direct request"
                );
                metrics::record_request(&method, 502, "none", start);
                return Box::pin(async { bad_gateway() });
            }
        };

        strip_hop_by_hop(&mut parts.headers);
        if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
            append_forwarded_for(&mut parts.headers, peer.ip());
        }
        // the upstream connection is always HTTP/1.1, whatever the client spoke
        parts.version = Version::HTTP_11;

        let outbound = Request::from_parts(parts, body);
        let client = self.client.clone();

        Box::pin(async move {
            match client.request(outbound).await {
                Ok(res) => {
                    let (mut parts, body) = res.into_parts();
                    strip_hop_by_hop(&mut parts.headers);
                    metrics::record_request(&method, parts.status.as_u16(), &upstream, start);
                    Response::from_parts(parts, Body::new(body))
                }
                Err(e) => {
                    tracing::error!(
                        request_id = %request_id,
                        upstream = %upstream,
                        error = %e,
                        "Upstream request failed"
                    );
                    metrics::record_upstream_error(&upstream);
                    metrics::record_request(&method, 502, &upstream, start);
                    bad_gateway()
                }
            }
        })
    }
}
