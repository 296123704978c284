//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registered → upstreams.strategy ("rr")
//!     → Strategy::from_str (unsupported names rejected at construction)
//!     → balancer_for(strategy) → Arc<dyn LoadBalancer>
//!
//! Per forwarded request:
//!     director → LoadBalancer::elect(targets) → upstream host
//! ```
//!
//! # Design Decisions
//! - Balancers hold only their own cursor; the host list is passed per call
//! - Election is safe under concurrent callers (atomic cursor)
//! - Strategy errors surface at construction, never at election time

pub mod round_robin;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::load_balancer::round_robin::RoundRobin;

/// Errors produced by load balancer construction and election.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LbError {
    /// No upstream targets were supplied.
    #[error("no targets are provided")]
    EmptyTargets,

    /// The configured strategy name is not known.
    #[error("load balancing strategy `{0}` not supported")]
    UnsupportedStrategy(String),
}

/// Picks one upstream host out of an ordered host list.
pub trait LoadBalancer: Send + Sync + fmt::Debug {
    /// Elect a host. Fails with [`LbError::EmptyTargets`] when `hosts` is empty.
    fn elect<'a>(&self, hosts: &'a [String]) -> Result<&'a str, LbError>;
}

/// Supported balancing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    RoundRobin,
}

impl FromStr for Strategy {
    type Err = LbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rr" => Ok(Strategy::RoundRobin),
            other => Err(LbError::UnsupportedStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::RoundRobin => f.write_str("rr"),
        }
    }
}

/// Build a fresh balancer for the named strategy.
pub fn balancer_for(strategy: &str) -> Result<Arc<dyn LoadBalancer>, LbError> {
    match strategy.parse::<Strategy>()? {
        Strategy::RoundRobin => Ok(Arc::new(RoundRobin::new())),
    }
}
