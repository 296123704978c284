//! Rate limiter plugin.
//!
//! # Data Flow
//! ```text
//! Plugin config {"quota": 2, "per": "s", "store": "local"}
//!     → LimiterConfig::parse (typed once, at load time)
//!     → MemoryStore (registered with the Cleaner)
//!     → RateLimiter middleware appended to the route
//!
//! Per request:
//!     subject key (X-Real-IP / X-Forwarded-For / peer)
//!     → store.is_allowed → 429 or next
//! ```

pub mod cleaner;
pub mod limit;
pub mod middleware;
pub mod store;
pub mod subject;

use std::sync::Arc;

use serde::Deserialize;

use crate::plugins::{PluginConfig, PluginError, SetupContext};
use crate::proxy::RouterDefinition;

pub use cleaner::Cleaner;
pub use limit::{Limit, Period};
pub use middleware::RateLimiter;
pub use store::{MemoryStore, SweepStats, Verdict};

#[derive(Debug, Deserialize)]
struct RawLimiterConfig {
    #[serde(default, alias = "Quota")]
    quota: i64,

    #[serde(default, alias = "Per")]
    per: String,

    #[serde(default, alias = "Store")]
    store: String,
}

/// Backing store for limiter state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Local,
}

/// Validated limiter configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterConfig {
    pub quota: i64,
    pub period: Period,
    pub store: StoreKind,
}

impl LimiterConfig {
    pub fn parse(raw: &PluginConfig) -> Result<Self, PluginError> {
        let raw: RawLimiterConfig = serde_json::from_value(serde_json::Value::Object(raw.clone()))
            .map_err(|source| PluginError::Config {
                plugin: "limiter",
                source,
            })?;

        let period: Period = raw.per.parse()?;
        let store = match raw.store.as_str() {
            "local" => StoreKind::Local,
            other => {
                tracing::warn!(store = %other, "Unsupported limiter store, using local");
                StoreKind::Local
            }
        };

        Ok(Self {
            quota: raw.quota,
            period,
            store,
        })
    }
}

/// Attach a rate limiter to the route.
pub fn setup_limiter(
    ctx: &SetupContext,
    def: &mut RouterDefinition,
    raw: &PluginConfig,
) -> Result<(), PluginError> {
    let config = LimiterConfig::parse(raw)?;

    let store = match config.store {
        StoreKind::Local => Arc::new(MemoryStore::new(config.quota, config.period)),
    };
    ctx.cleaner.register(store.clone());

    tracing::debug!(
        listen_path = %def.route().listen_path,
        quota = store.quota(),
        per = %store.period(),
        "Limiter configured"
    );
    let limiter = RateLimiter::new(store, def.route().listen_path.clone());
    def.add_middleware(Arc::new(limiter));
    Ok(())
}
