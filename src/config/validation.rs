//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports, limits)
//! - Check that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::IpAddr;

use crate::config::schema::GatewayConfig;

/// One failed semantic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.parse::<IpAddr>().is_err() && config.host != "localhost" {
        errors.push(ValidationError::new(
            "host",
            format!("`{}` is not an IP address", config.host),
        ));
    }

    let timeouts = [
        ("grace_timeout", config.grace_timeout),
        ("read_timeout", config.read_timeout),
        ("write_timeout", config.write_timeout),
        ("idle_timeout", config.idle_timeout),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.max_connections == 0 {
        errors.push(ValidationError::new("max_connections", "must be greater than 0"));
    }

    if let (Some(addr), Some(Err(_))) = (&config.metrics_address, config.metrics_socket()) {
        errors.push(ValidationError::new(
            "metrics_address",
            format!("`{}` is not a socket address", addr),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
