//! Outbound request rewriting.
//!
//! The director elects an upstream for every request and rewrites the
//! request in place so it can be handed to the HTTP client:
//!
//! ```text
//! GET /api/users?page=2          (listen_path "/api/*", strip_path)
//!     → elect "http://10.0.0.2:9000/base"
//!     → GET http://10.0.0.2:9000/base/users?page=2
//!     → Host: 10.0.0.2:9000      (unless preserve_host)
//! ```

use std::sync::Arc;

use axum::http::header::{self, HeaderValue, InvalidHeaderValue};
use axum::http::request::Parts;
use axum::http::Uri;
use thiserror::Error;
use url::{Position, Url};

use crate::load_balancer::{LbError, LoadBalancer};
use crate::proxy::definition::RouteDefinition;

#[derive(Debug, Error)]
pub enum DirectorError {
    #[error("could not elect an upstream: {0}")]
    Election(#[from] LbError),

    #[error("invalid upstream `{target}`: {source}")]
    InvalidUpstream {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("could not build upstream URI: {0}")]
    Uri(#[from] axum::http::Error),

    #[error("invalid Host header: {0}")]
    Host(#[from] InvalidHeaderValue),
}

/// Rewrites inbound requests towards the elected upstream.
#[derive(Debug, Clone)]
pub struct Director {
    route: Arc<RouteDefinition>,
    balancer: Arc<dyn LoadBalancer>,
    strip_prefix: Option<String>,
}

impl Director {
    pub fn new(route: RouteDefinition, balancer: Arc<dyn LoadBalancer>) -> Self {
        let strip_prefix = if route.strip_path {
            route
                .mount_prefix()
                .filter(|prefix| !prefix.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        Self {
            route: Arc::new(route),
            balancer,
            strip_prefix,
        }
    }

    pub fn route(&self) -> &RouteDefinition {
        &self.route
    }

    /// Point `parts` at an elected upstream. Returns the upstream authority.
    pub fn direct(&self, parts: &mut Parts) -> Result<String, DirectorError> {
        let target = self.balancer.elect(&self.route.upstreams.targets)?;
        let upstream = Url::parse(target).map_err(|source| DirectorError::InvalidUpstream {
            target: target.to_string(),
            source,
        })?;

        let authority = &upstream[Position::BeforeHost..Position::AfterPort];
        let path = self.upstream_path(&upstream, parts.uri.path());
        let path_and_query = match parts.uri.query() {
            Some(query) => format!("{}?{}", path, query),
            None => path,
        };

        let uri = Uri::builder()
            .scheme(upstream.scheme())
            .authority(authority)
            .path_and_query(path_and_query)
            .build()?;
        let original = std::mem::replace(&mut parts.uri, uri);

        if !self.route.preserve_host {
            parts
                .headers
                .insert(header::HOST, HeaderValue::from_str(authority)?);
        } else if !parts.headers.contains_key(header::HOST) {
            // HTTP/2 requests carry the host in the URI only
            if let Some(inbound) = original.authority() {
                parts
                    .headers
                    .insert(header::HOST, HeaderValue::from_str(inbound.as_str())?);
            }
        }

        tracing::debug!(
            from = %original,
            to = %parts.uri,
            "Request directed upstream"
        );
        Ok(authority.to_string())
    }

    /// Upstream base path joined with the request path, minus the mount
    /// prefix when `strip_path` is set.
    fn upstream_path(&self, upstream: &Url, request_path: &str) -> String {
        let request_path = match &self.strip_prefix {
            Some(prefix) => request_path.replacen(prefix.as_str(), "", 1),
            None => request_path.to_string(),
        };

        let joined = format!("{}{}", upstream.path().trim_end_matches('/'), request_path);
        if joined.is_empty() {
            "/".to_string()
        } else if !joined.starts_with('/') {
            format!("/{}", joined)
        } else {
            joined
        }
    }
}
