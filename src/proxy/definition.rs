//! Route definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::routing::matcher::mount_prefix;
use crate::routing::BoxMiddleware;

/// Validation errors for a route definition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("no targets are provided")]
    EmptyTargets,

    #[error("invalid URL: {url} ({reason})")]
    InvalidUrl { url: String, reason: String },
}

/// Upstream targets and the strategy used to pick one.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Upstreams {
    #[serde(default)]
    pub strategy: String,

    #[serde(default)]
    pub targets: Vec<String>,
}

impl Upstreams {
    /// Every target must be an absolute URL with a host.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.targets.is_empty() {
            return Err(DefinitionError::EmptyTargets);
        }
        for target in &self.targets {
            let url = Url::parse(target).map_err(|e| DefinitionError::InvalidUrl {
                url: target.clone(),
                reason: e.to_string(),
            })?;
            if !url.has_host() {
                return Err(DefinitionError::InvalidUrl {
                    url: target.clone(),
                    reason: "missing host".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One configured mapping from a listen path to a set of upstreams.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RouteDefinition {
    #[serde(default)]
    pub listen_path: String,

    #[serde(default)]
    pub upstreams: Upstreams,

    #[serde(default)]
    pub preserve_host: bool,

    #[serde(default)]
    pub strip_path: bool,
}

impl RouteDefinition {
    /// Only upstream validity is checked here; the listen path is checked at
    /// registration, where a bad one is skipped rather than fatal.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.upstreams.validate()
    }

    /// Listen path with its `/*` mount suffix removed.
    pub fn mount_prefix(&self) -> Option<&str> {
        mount_prefix(&self.listen_path)
    }
}

/// A route definition plus the middleware its plugins attached.
pub struct RouterDefinition {
    route: RouteDefinition,
    middlewares: Vec<BoxMiddleware>,
}

impl RouterDefinition {
    pub fn new(route: RouteDefinition) -> Self {
        Self {
            route,
            middlewares: Vec::new(),
        }
    }

    pub fn route(&self) -> &RouteDefinition {
        &self.route
    }

    /// Append route middleware; attachment order is execution order.
    pub fn add_middleware(&mut self, middleware: BoxMiddleware) {
        self.middlewares.push(middleware);
    }

    pub fn middlewares(&self) -> &[BoxMiddleware] {
        &self.middlewares
    }

    pub fn into_parts(self) -> (RouteDefinition, Vec<BoxMiddleware>) {
        (self.route, self.middlewares)
    }
}

impl std::fmt::Debug for RouterDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterDefinition")
            .field("route", &self.route)
            .field(
                "middlewares",
                &self.middlewares.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstreams(targets: &[&str]) -> Upstreams {
        Upstreams {
            strategy: "rr".into(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_validate_targets() {
        assert!(upstreams(&["http://localhost:9000", "http://10.0.0.2/base"]).validate().is_ok());
        assert_eq!(upstreams(&[]).validate(), Err(DefinitionError::EmptyTargets));
        assert!(matches!(
            upstreams(&["localhost:9000/path"]).validate(),
            Err(DefinitionError::InvalidUrl { .. })
        ));
        assert!(matches!(
            upstreams(&["not a url"]).validate(),
            Err(DefinitionError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_deserialize_route() {
        let route: RouteDefinition = serde_json::from_str(
            r#"{
                "listen_path": "/api/*",
                "upstreams": {"strategy": "rr", "targets": ["http://up:1/base"]},
                "strip_path": true
            }"#,
        )
        .unwrap();

        assert_eq!(route.mount_prefix(), Some("/api"));
        assert!(route.strip_path);
        assert!(!route.preserve_host);
        assert!(route.validate().is_ok());
    }
}
