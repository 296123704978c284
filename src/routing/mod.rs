//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route table lookup)
//!     → matcher.rs (exact / subtree patterns)
//!     → Return: composed handler, redirect, or 404
//!
//! Route Registration:
//!     listen_path "/api/*"
//!     → matcher::mount_prefix → "/api" → pattern "/api/"
//!     → middleware::compose(global ++ route middleware, handler)
//!     → atomic swap of the route table
//! ```
//!
//! # Design Decisions
//! - Chains are composed once at registration, not per request
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod middleware;
pub mod router;

pub use middleware::{
    compose, handler_fn, middleware_fn, BoxHandler, BoxMiddleware, Handler, HandlerFuture,
    Middleware, Next,
};
pub use router::{Router, RouterError};
