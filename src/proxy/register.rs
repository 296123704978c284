//! Route registration.
//!
//! Turns a [`RouterDefinition`] into a reverse proxy handler mounted on the
//! shared router. A bad strategy aborts loading; a bad or duplicate listen
//! path only skips the route.

use std::sync::Arc;

use thiserror::Error;

use crate::load_balancer::{balancer_for, LbError};
use crate::proxy::definition::RouterDefinition;
use crate::proxy::director::Director;
use crate::proxy::reverse_proxy::{http_client, HttpClient, ReverseProxy};
use crate::routing::Router;

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("route `{listen_path}`: {source}")]
    Balancer {
        listen_path: String,
        #[source]
        source: LbError,
    },
}

/// Outcome of a non-fatal registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// Mounted at the contained pattern.
    Registered(String),
    /// Left out; the reason was logged.
    Skipped,
}

/// Mounts proxy routes on a router.
pub struct ProxyRegister {
    router: Arc<Router>,
    client: HttpClient,
}

impl ProxyRegister {
    pub fn new(router: Arc<Router>) -> Self {
        Self::with_client(router, http_client())
    }

    pub fn with_client(router: Arc<Router>, client: HttpClient) -> Self {
        Self { router, client }
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn add(&self, definition: RouterDefinition) -> Result<Registration, RegisterError> {
        let (route, middlewares) = definition.into_parts();

        let balancer =
            balancer_for(&route.upstreams.strategy).map_err(|source| RegisterError::Balancer {
                listen_path: route.listen_path.clone(),
                source,
            })?;

        let pattern = match route.mount_prefix() {
            Some(prefix) => format!("{}/", prefix),
            None => {
                tracing::warn!(
                    listen_path = %route.listen_path,
                    "Listen path is not a `/*` mount, route skipped"
                );
                return Ok(Registration::Skipped);
            }
        };

        let listen_path = route.listen_path.clone();
        let handler = Arc::new(ReverseProxy::new(
            Director::new(route, balancer),
            self.client.clone(),
        ));

        match self.router.register_path(&pattern, handler, &middlewares) {
            Ok(()) => {
                tracing::info!(
                    listen_path = %listen_path,
                    pattern = %pattern,
                    middlewares = middlewares.len(),
                    "Route registered"
                );
                Ok(Registration::Registered(pattern))
            }
            Err(e) => {
                tracing::warn!(listen_path = %listen_path, error = %e, "Route skipped");
                Ok(Registration::Skipped)
            }
        }
    }
}
