//! Route-level HTTP middleware shipped with the gateway.

pub mod enforce_json;

pub use enforce_json::{parse_media_type, EnforceJson, MediaTypeError};
