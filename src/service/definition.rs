//! Service definitions.
//!
//! Keys are matched case-insensitively (`Active`, `active` and `ACTIVE` are
//! the same key); underscores are significant.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::plugins::PluginConfig;
use crate::proxy::{DefinitionError, RouteDefinition};

/// A plugin entry of a service definition.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Plugin {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub config: PluginConfig,
}

/// One proxied service.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub name: String,

    /// Inactive services are parsed but never registered.
    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub proxy: RouteDefinition,

    #[serde(default)]
    pub plugins: Vec<Plugin>,
}

impl ServiceDefinition {
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.proxy.validate()
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed service definitions: {0}")]
    Json(#[from] serde_json::Error),

    #[error("service `{name}`: {source}")]
    Invalid {
        name: String,
        #[source]
        source: DefinitionError,
    },
}

/// Lower-case every object key, recursively.
fn fold_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| (key.to_lowercase(), fold_keys(value)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(fold_keys).collect()),
        other => other,
    }
}

/// Parse a JSON array of service definitions. Every active definition must
/// validate.
pub fn parse_definitions(raw: &str) -> Result<Vec<ServiceDefinition>, ParseError> {
    let value: Value = serde_json::from_str(raw)?;
    let definitions: Vec<ServiceDefinition> = serde_json::from_value(fold_keys(value))?;

    for def in definitions.iter().filter(|d| d.active) {
        def.validate().map_err(|source| ParseError::Invalid {
            name: def.name.clone(),
            source,
        })?;
    }

    Ok(definitions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {
            "Name": "users",
            "Active": true,
            "Proxy": {
                "listen_path": "/users/*",
                "upstreams": {"strategy": "rr", "targets": ["http://10.0.0.1:8000"]},
                "strip_path": true
            },
            "Plugins": [
                {"Name": "limiter", "Enable": true, "Config": {"quota": 10, "per": "m"}},
                {"Name": "enforce_json", "Enable": false}
            ]
        },
        {
            "name": "legacy",
            "proxy": {"listen_path": "/legacy/*", "upstreams": {"strategy": "rr", "targets": []}}
        }
    ]"#;

    #[test]
    fn test_parse_both_capitalisations() {
        let defs = parse_definitions(SAMPLE).unwrap();
        assert_eq!(defs.len(), 2);

        let users = &defs[0];
        assert_eq!(users.name, "users");
        assert!(users.active);
        assert!(users.proxy.strip_path);
        assert_eq!(users.plugins.len(), 2);
        assert_eq!(users.plugins[0].config["quota"], 10);
        assert!(users.plugins[1].config.is_empty());

        // inactive by default, and not validated
        assert!(!defs[1].active);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let raw = r#"[{"NAME": "shout", "ACTIVE": true,
            "PROXY": {"Listen_Path": "/s/*", "UPSTREAMS": {"Strategy": "rr", "TARGETS": ["http://up:1"]},
                      "Strip_Path": true},
            "PLUGINS": [{"NAME": "limiter", "ENABLE": true, "CONFIG": {"QUOTA": 3, "PER": "m"}}]}]"#;

        let defs = parse_definitions(raw).unwrap();
        let shout = &defs[0];
        assert_eq!(shout.name, "shout");
        assert!(shout.active);
        assert_eq!(shout.proxy.listen_path, "/s/*");
        assert_eq!(shout.proxy.upstreams.targets, vec!["http://up:1"]);
        assert!(shout.proxy.strip_path);
        assert!(shout.plugins[0].enable);
        assert_eq!(shout.plugins[0].config["quota"], 3);
    }

    #[test]
    fn test_invalid_active_definition_is_rejected() {
        let raw = r#"[{"Name": "broken", "Active": true,
            "Proxy": {"listen_path": "/b/*", "upstreams": {"strategy": "rr", "targets": ["nohost"]}}}]"#;
        let err = parse_definitions(raw).unwrap_err();
        assert!(matches!(err, ParseError::Invalid { ref name, .. } if name == "broken"));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse_definitions("{not json"), Err(ParseError::Json(_))));
        assert!(parse_definitions("[]").unwrap().is_empty());
    }
}
