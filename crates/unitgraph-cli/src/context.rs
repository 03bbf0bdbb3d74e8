//! Locating the manifest and unit file a command operates on.

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use unitgraph_core::{CapabilityIndex, ResolveManifest};
use unitgraph_schema::UnitRecord;

use crate::Cli;

/// Inputs shared by every command.
#[derive(Debug)]
pub struct Context {
    /// The manifest in effect; empty if none was found.
    pub manifest: ResolveManifest,
    /// Where the manifest was read from.
    pub manifest_path: Option<PathBuf>,
    /// The unit file to index.
    pub units_path: PathBuf,
}

impl Context {
    /// Resolve `--manifest`/`--units` against the working directory.
    pub fn discover(cli: &Cli) -> Result<Self> {
        let manifest_path = match &cli.manifest {
            Some(path) => Some(path.clone()),
            None => {
                let cwd = std::env::current_dir().context("Failed to read working directory")?;
                ResolveManifest::find(&cwd)
            }
        };

        let manifest = match &manifest_path {
            Some(path) => ResolveManifest::load(path)
                .with_context(|| format!("Failed to load manifest {}", path.display()))?,
            None => ResolveManifest::default(),
        };

        let units_path = cli
            .units
            .clone()
            .or_else(|| {
                let dir = manifest_path
                    .as_deref()
                    .and_then(Path::parent)
                    .unwrap_or(Path::new("."));
                manifest.units_path(dir)
            })
            .context("No unit file given; pass --units or set `units` in unitgraph.toml")?;

        Ok(Self {
            manifest,
            manifest_path,
            units_path,
        })
    }

    /// Read the unit file and build the index.
    pub fn load_index(&self) -> Result<CapabilityIndex> {
        let path = &self.units_path;
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read unit file {}", path.display()))?;
        let records: Vec<UnitRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse unit file {}", path.display()))?;
        tracing::debug!("Read {} unit records from {}", records.len(), path.display());

        CapabilityIndex::populate(records)
            .with_context(|| format!("Failed to index {}", path.display()))
    }
}
