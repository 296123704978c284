//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarded request:
//!     → headers.rs (strip hop-by-hop, append X-Forwarded-For)
//!     → upstream
//! Upstream response:
//!     → headers.rs (strip hop-by-hop)
//!     → client
//! ```
//!
//! # Design Decisions
//! - No trust in client input: connection-scoped headers never cross the proxy

pub mod headers;
