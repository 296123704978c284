//! Service subsystem.
//!
//! # Data Flow
//! ```text
//! definitions.json
//!     → loader.rs (read, parse, validate active services)
//!     → plugins (attach route middleware)
//!     → proxy register (mount on the router)
//! ```

pub mod definition;
pub mod loader;

pub use definition::{parse_definitions, ParseError, Plugin, ServiceDefinition};
pub use loader::{LoadReport, LoaderError, ServiceLoader};
