//! Subcommand implementations.

pub mod info;
pub mod providers;
pub mod resolve;
pub mod stats;

/// Width of the label column in text output.
const LABEL_WIDTH: usize = 14;
