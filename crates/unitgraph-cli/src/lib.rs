//! unitgraph - installable-unit dependency resolution
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Reads a JSON array of unit records, indexes it, and answers questions
//! about it from the command line.
//!
//! # Inputs
//!
//! The unit file is taken from `--units`, then `UNITGRAPH_UNITS`, then the
//! `units` key of the nearest `unitgraph.toml`. Flags given on the command
//! line override the manifest.

pub mod cmd;
pub mod context;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "unitgraph")]
#[command(author, version, about = "Resolve installable-unit dependency closures")]
pub struct Cli {
    /// JSON file holding an array of unit records
    #[arg(long, global = true, env = "UNITGRAPH_UNITS")]
    pub units: Option<PathBuf>,

    /// Manifest to read instead of searching for unitgraph.toml
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Resolve the closure of one or more root units
    Resolve(ResolveArgs),
    /// Show a unit's capabilities and requirements
    Info {
        /// Unit id, optionally with version: id or id@1.0.0
        unit: String,
    },
    /// List the units providing a capability
    Providers {
        /// Capability namespace (e.g. osgi.bundle, java.package)
        namespace: String,
        /// Capability name
        name: String,
    },
    /// Summarize the unit file
    Stats,
}

#[derive(Debug, clap::Args)]
pub struct ResolveArgs {
    /// Root units: id or id@version. Replaces the manifest's roots.
    pub roots: Vec<String>,

    /// Add every unit whose properties match this filter as a root
    #[arg(long, value_name = "FILTER")]
    pub matching: Option<String>,

    /// Target platform as ws.os.arch (e.g. gtk.linux.x86_64)
    #[arg(long, env = "UNITGRAPH_PLATFORM")]
    pub platform: Option<String>,

    /// Extra environment fact for filter evaluation
    #[arg(long = "fact", value_name = "KEY=VALUE")]
    pub facts: Vec<String>,

    /// Never resolve this unit id
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Never resolve unit ids starting with this prefix
    #[arg(long)]
    pub exclude_prefix: Vec<String>,

    /// Exit with an error if any mandatory requirement is unmet
    #[arg(long)]
    pub fail_on_unmet: bool,
}
