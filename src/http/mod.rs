//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper connection, Axum app, peer address)
//!     → gateway router (global middleware: request.rs request ID)
//!     → route middleware (middleware/: content-type enforcement, limiter)
//!     → reverse proxy
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdMiddleware, X_REQUEST_ID};
pub use server::{HttpServer, ServerSettings, ServerState};
