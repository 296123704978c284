//! Proxy subsystem.
//!
//! # Data Flow
//! ```text
//! RouteDefinition (from a service definition)
//!     → register.rs (strategy → balancer, listen path → pattern)
//!     → reverse_proxy.rs (terminal handler on the router)
//!
//! Per request:
//!     → director.rs (elect upstream, rewrite URI and Host)
//!     → shared HTTP client → upstream
//! ```

pub mod definition;
pub mod director;
pub mod register;
pub mod reverse_proxy;

pub use definition::{DefinitionError, RouteDefinition, RouterDefinition, Upstreams};
pub use director::{Director, DirectorError};
pub use register::{ProxyRegister, RegisterError, Registration};
pub use reverse_proxy::{http_client, HttpClient, ReverseProxy};
