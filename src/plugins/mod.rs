//! Plugin subsystem.
//!
//! A plugin is a named capability that attaches middleware to a route from
//! its declarative configuration. The set of plugins is closed: a name
//! resolves to a [`PluginKind`], and each kind has one setup function.
//!
//! # Design Decisions
//! - Setup functions receive injected services through [`SetupContext`]
//! - Configurations are parsed into typed structs once, at load time
//! - Only configuration errors that cannot be defaulted are fatal

pub mod rate_limit;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::http::middleware::EnforceJson;
use crate::plugins::rate_limit::{setup_limiter, Cleaner};
use crate::proxy::RouterDefinition;

/// Raw plugin configuration, as found in a service definition.
pub type PluginConfig = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin `{0}` not found")]
    NotFound(String),

    #[error("invalid `{plugin}` configuration: {source}")]
    Config {
        plugin: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported rate limit period `{0}`, should be one of s/m/h")]
    UnsupportedPeriod(String),
}

impl PluginError {
    /// Fatal errors abort loading; the rest only skip the plugin.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PluginError::UnsupportedPeriod(_))
    }
}

/// Services handed to every setup function.
#[derive(Debug, Clone)]
pub struct SetupContext {
    pub cleaner: Cleaner,
}

impl SetupContext {
    pub fn new(cleaner: Cleaner) -> Self {
        Self { cleaner }
    }
}

pub type SetupFn =
    fn(&SetupContext, &mut RouterDefinition, &PluginConfig) -> Result<(), PluginError>;

/// Built-in plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Limiter,
    EnforceJson,
}

impl PluginKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PluginKind::Limiter => "limiter",
            PluginKind::EnforceJson => "enforce_json",
        }
    }

    pub fn setup_fn(self) -> SetupFn {
        match self {
            PluginKind::Limiter => setup_limiter,
            PluginKind::EnforceJson => setup_enforce_json,
        }
    }
}

impl FromStr for PluginKind {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "limiter" => Ok(PluginKind::Limiter),
            "enforce_json" => Ok(PluginKind::EnforceJson),
            other => Err(PluginError::NotFound(other.to_string())),
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn setup_enforce_json(
    _ctx: &SetupContext,
    def: &mut RouterDefinition,
    _raw: &PluginConfig,
) -> Result<(), PluginError> {
    def.add_middleware(Arc::new(EnforceJson));
    Ok(())
}

/// Resolves plugin names and runs their setup.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    context: SetupContext,
}

impl PluginRegistry {
    pub fn new(cleaner: Cleaner) -> Self {
        Self {
            context: SetupContext::new(cleaner),
        }
    }

    pub fn setup_func(&self, name: &str) -> Result<SetupFn, PluginError> {
        Ok(name.parse::<PluginKind>()?.setup_fn())
    }

    /// Resolve `name` and attach the plugin to `def`.
    pub fn configure(
        &self,
        def: &mut RouterDefinition,
        name: &str,
        config: &PluginConfig,
    ) -> Result<(), PluginError> {
        let setup = self.setup_func(name)?;
        setup(&self.context, def, config)
    }

    pub fn cleaner(&self) -> &Cleaner {
        &self.context.cleaner
    }
}
