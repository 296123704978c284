//! Service loading.
//!
//! # Responsibilities
//! - Read the service definition file
//! - Resolve and configure each service's plugins
//! - Hand the resulting route to the proxy register
//!
//! # Design Decisions
//! - A missing or unreadable file means "no services", not a failure
//! - Malformed or invalid definitions abort loading
//! - Plugin problems skip the plugin unless the error is fatal

use std::path::Path;

use thiserror::Error;

use crate::plugins::{PluginError, PluginRegistry};
use crate::proxy::{ProxyRegister, RegisterError, Registration, RouterDefinition};
use crate::service::definition::{parse_definitions, ParseError, ServiceDefinition};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("service `{service}`: plugin `{plugin}`: {source}")]
    Plugin {
        service: String,
        plugin: String,
        #[source]
        source: PluginError,
    },

    #[error("service `{service}`: {source}")]
    Register {
        service: String,
        #[source]
        source: RegisterError,
    },
}

/// Summary of one registration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub registered: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct ServiceLoader {
    register: ProxyRegister,
    plugins: PluginRegistry,
}

impl ServiceLoader {
    pub fn new(register: ProxyRegister, plugins: PluginRegistry) -> Self {
        Self { register, plugins }
    }

    pub async fn load_definitions(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<Vec<ServiceDefinition>, LoaderError> {
        let path = path.as_ref();
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Could not read service definition file"
                );
                return Ok(Vec::new());
            }
        };

        let definitions = parse_definitions(&raw)?;
        for def in &definitions {
            tracing::debug!(
                service = %def.name,
                proxy = ?def.proxy,
                plugins = ?def.plugins.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
                "Service definition loaded"
            );
        }
        Ok(definitions)
    }

    pub fn register_services(
        &self,
        definitions: Vec<ServiceDefinition>,
    ) -> Result<LoadReport, LoaderError> {
        let mut report = LoadReport::default();
        for def in definitions {
            let name = def.name.clone();
            if self.register_service(def)? {
                report.registered.push(name);
            } else {
                report.skipped.push(name);
            }
        }
        Ok(report)
    }

    /// Returns true if the service ended up mounted on the router.
    fn register_service(&self, service: ServiceDefinition) -> Result<bool, LoaderError> {
        if !service.active {
            tracing::warn!(service = %service.name, "Service is not active, skipping registration");
            return Ok(false);
        }

        let mut route = RouterDefinition::new(service.proxy);
        for plugin in &service.plugins {
            if !plugin.enable {
                tracing::warn!(
                    service = %service.name,
                    plugin = %plugin.name,
                    "Plugin is not enabled, skipping"
                );
                continue;
            }

            match self.plugins.configure(&mut route, &plugin.name, &plugin.config) {
                Ok(()) => {
                    tracing::debug!(service = %service.name, plugin = %plugin.name, "Plugin configured")
                }
                Err(e) if e.is_fatal() => {
                    return Err(LoaderError::Plugin {
                        service: service.name.clone(),
                        plugin: plugin.name.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        service = %service.name,
                        plugin = %plugin.name,
                        error = %e,
                        "Failed configuring plugin"
                    );
                }
            }
        }

        let registration = self
            .register
            .add(route)
            .map_err(|source| LoaderError::Register {
                service: service.name.clone(),
                source,
            })?;

        Ok(matches!(registration, Registration::Registered(_)))
    }

    /// Load the file at `path` and register everything in it.
    pub async fn load_and_register(&self, path: impl AsRef<Path>) -> Result<LoadReport, LoaderError> {
        let definitions = self.load_definitions(path).await?;
        let report = self.register_services(definitions)?;
        tracing::info!(
            registered = report.registered.len(),
            skipped = report.skipped.len(),
            "Services loaded"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::rate_limit::Cleaner;
    use crate::routing::Router;
    use std::io::Write;
    use std::sync::Arc;

    fn loader() -> (ServiceLoader, Arc<Router>, Cleaner) {
        let router = Arc::new(Router::new());
        let cleaner = Cleaner::new();
        let loader = ServiceLoader::new(
            ProxyRegister::new(router.clone()),
            PluginRegistry::new(cleaner.clone()),
        );
        (loader, router, cleaner)
    }

    fn parse(raw: &str) -> Vec<ServiceDefinition> {
        parse_definitions(raw).unwrap()
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let (loader, _, _) = loader();
        let defs = loader.load_definitions("/nonexistent/services.json").await.unwrap();
        assert!(defs.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_file_is_fatal() {
        let (loader, _, _) = loader();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{{\"Name\": ").unwrap();

        assert!(matches!(
            loader.load_definitions(file.path()).await,
            Err(LoaderError::Parse(ParseError::Json(_)))
        ));
    }

    #[tokio::test]
    async fn test_registers_active_services_only() {
        let (loader, router, cleaner) = loader();
        let defs = parse(
            r#"[
            {"Name": "on", "Active": true, "Proxy": {"listen_path": "/on/*",
                "upstreams": {"strategy": "rr", "targets": ["http://127.0.0.1:9"]}},
             "Plugins": [
                {"Name": "limiter", "Enable": true, "Config": {"quota": 1, "per": "s"}},
                {"Name": "limiter", "Enable": false, "Config": {"quota": 1, "per": "s"}},
                {"Name": "unknown", "Enable": true}
             ]},
            {"Name": "off", "Active": false, "Proxy": {"listen_path": "/off/*",
                "upstreams": {"strategy": "rr", "targets": ["http://127.0.0.1:9"]}}}
        ]"#,
        );

        let report = loader.register_services(defs).unwrap();

        assert_eq!(report.registered, vec!["on"]);
        assert_eq!(report.skipped, vec!["off"]);
        assert_eq!(router.patterns(), vec!["/on/"]);
        assert_eq!(cleaner.store_count(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_period_aborts() {
        let (loader, router, _) = loader();
        let defs = parse(
            r#"[{"Name": "svc", "Active": true, "Proxy": {"listen_path": "/svc/*",
                "upstreams": {"strategy": "rr", "targets": ["http://127.0.0.1:9"]}},
              "Plugins": [{"Name": "limiter", "Enable": true, "Config": {"per": "week"}}]}]"#,
        );

        let err = loader.register_services(defs).unwrap_err();
        assert!(matches!(
            err,
            LoaderError::Plugin { source: PluginError::UnsupportedPeriod(_), .. }
        ));
        assert!(router.patterns().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_strategy_aborts() {
        let (loader, _, _) = loader();
        let defs = parse(
            r#"[{"Name": "svc", "Active": true, "Proxy": {"listen_path": "/svc/*",
                "upstreams": {"strategy": "random", "targets": ["http://127.0.0.1:9"]}}}]"#,
        );
        assert!(matches!(
            loader.register_services(defs),
            Err(LoaderError::Register { .. })
        ));
    }
}
