//! Declarative API gateway library.
//!
//! Services are described in a JSON definition file; each active service is
//! mounted on the router under its listen path, wrapped in the middleware its
//! plugins contribute, and forwarded to its upstreams by a reverse proxy.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Traffic management
pub mod load_balancer;
pub mod plugins;
pub mod proxy;
pub mod service;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::{Gateway, RunningGateway, Shutdown};
