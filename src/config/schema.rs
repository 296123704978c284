//! Configuration schema definitions.
//!
//! The global gateway configuration. All fields have defaults, so an empty
//! file is a valid configuration. Keys are accepted in snake_case and in the
//! flat lowercase / CamelCase spellings (`gracetimeout`, `GraceTimeout`).

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address for the public listener.
    pub host: String,

    #[serde(alias = "Port")]
    pub port: u16,

    /// Install the request-ID middleware on every route.
    #[serde(alias = "addreqid", alias = "AddReqID")]
    pub add_request_id: bool,

    /// Seconds allowed for in-flight connections to finish on shutdown.
    #[serde(alias = "gracetimeout", alias = "GraceTimeout")]
    pub grace_timeout: u64,

    /// Seconds allowed for reading request headers.
    #[serde(alias = "readtimeout", alias = "ReadTimeout")]
    pub read_timeout: u64,

    /// Seconds allowed for producing a response.
    #[serde(alias = "writetimeout", alias = "WriteTimeout")]
    pub write_timeout: u64,

    /// Seconds a connection may stay without an in-flight request before it
    /// is closed (HTTP/1.1 keep-alive and HTTP/2 alike).
    #[serde(alias = "idletimeout", alias = "IdleTimeout")]
    pub idle_timeout: u64,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Log filter used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Prometheus listener, e.g. "127.0.0.1:9090". Disabled when absent.
    pub metrics_address: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            add_request_id: true,
            grace_timeout: 15,
            read_timeout: 15,
            write_timeout: 15,
            idle_timeout: 15,
            max_connections: 10_000,
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}

impl GatewayConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn grace_timeout(&self) -> Duration {
        Duration::from_secs(self.grace_timeout)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    /// Parsed metrics listener address, if configured.
    pub fn metrics_socket(&self) -> Option<Result<SocketAddr, std::net::AddrParseError>> {
        self.metrics_address.as_deref().map(str::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 8080);
        assert!(config.add_request_id);
        assert_eq!(config.grace_timeout(), Duration::from_secs(15));
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_flat_and_camel_case_keys() {
        let flat: GatewayConfig =
            serde_json::from_str(r#"{"port": 9000, "addreqid": false, "gracetimeout": 3}"#).unwrap();
        assert_eq!(flat.port, 9000);
        assert!(!flat.add_request_id);
        assert_eq!(flat.grace_timeout, 3);
        assert_eq!(flat.read_timeout, 15);

        let camel: GatewayConfig =
            serde_json::from_str(r#"{"Port": 9001, "AddReqID": false, "IdleTimeout": 30}"#).unwrap();
        assert_eq!(camel.port, 9001);
        assert!(!camel.add_request_id);
        assert_eq!(camel.idle_timeout, 30);
    }

    #[test]
    fn test_metrics_socket() {
        let mut config = GatewayConfig::default();
        assert!(config.metrics_socket().is_none());

        config.metrics_address = Some("127.0.0.1:9090".into());
        assert_eq!(
            config.metrics_socket().unwrap().unwrap(),
            "127.0.0.1:9090".parse::<SocketAddr>().unwrap()
        );

        config.metrics_address = Some("localhost".into());
        assert!(config.metrics_socket().unwrap().is_err());
    }
}
