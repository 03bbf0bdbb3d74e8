//! Shared types for unitgraph.
//!
//! These are the records handed to the resolution engine by whatever
//! collaborator fetched and decoded repository metadata. Nothing in this
//! crate performs IO.

pub mod platform;
pub mod types;
pub mod unit;
pub mod version;

// Re-exports
pub use platform::*;
pub use types::*;
pub use unit::*;
pub use version::{Version, VersionError};
