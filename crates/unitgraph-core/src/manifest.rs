//! Resolution manifest (`unitgraph.toml`).
//!
//! A manifest pins down everything needed to repeat a resolution: where
//! the unit metadata lives, the target platform, the roots, and what to
//! exclude.
//!
//! ```toml
//! [project]
//! name = "my-ide"
//!
//! [resolve]
//! units = "units.json"
//! platform = "gtk.linux.x86_64"
//! roots = ["org.eclipse.swt", "org.eclipse.jface@3.31.0"]
//! exclude = ["org.eclipse.swt.browser"]
//! exclude-prefix = ["org.junit"]
//! fail-on-unmet = true
//!
//! [facts]
//! "org.eclipse.update.install.features" = "true"
//! ```

use crate::error::QueryError;
use crate::query::Query;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use unitgraph_schema::Platform;

/// File name looked up by [`ResolveManifest::find`].
pub const MANIFEST_FILE: &str = "unitgraph.toml";

/// Errors from reading a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// The manifest path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid manifest.
    #[error("Failed to parse unitgraph.toml: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveManifest {
    /// Project identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSection>,
    /// What to resolve.
    #[serde(default)]
    pub resolve: ResolveSection,
    /// Extra environment facts for filter evaluation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facts: BTreeMap<String, String>,
}

/// The `[project]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Human-readable project name.
    pub name: String,
}

/// The `[resolve]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResolveSection {
    /// Unit metadata file, relative to the manifest.
    pub units: Option<PathBuf>,
    /// Target platform triple.
    pub platform: Option<Platform>,
    /// Root units as `id` or `id@version`.
    #[serde(default)]
    pub roots: Vec<String>,
    /// Unit ids never to resolve.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Unit id prefixes never to resolve.
    #[serde(default)]
    pub exclude_prefix: Vec<String>,
    /// Treat unmet requirements as a failure.
    #[serde(default)]
    pub fail_on_unmet: bool,
}

impl ResolveManifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if the file cannot be read and
    /// [`ManifestError::Parse`] if it is not a valid manifest.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::parse(&content)?;
        tracing::debug!("Loaded manifest from {}", path.display());
        Ok(manifest)
    }

    /// Parse manifest text.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Parse`] if the text is not a valid manifest.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        Ok(toml::from_str(content)?)
    }

    /// Look for [`MANIFEST_FILE`] in `start` and then each of its parents.
    pub fn find(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(MANIFEST_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// The unit metadata path, resolved against the manifest's directory.
    pub fn units_path(&self, manifest_dir: &Path) -> Option<PathBuf> {
        self.resolve.units.as_ref().map(|units| {
            if units.is_absolute() {
                units.clone()
            } else {
                manifest_dir.join(units)
            }
        })
    }

    /// Configure `query` with this manifest's platform, facts, exclusions
    /// and roots.
    ///
    /// Facts are applied after the platform so an explicit `osgi.*` fact
    /// overrides the platform default.
    ///
    /// # Errors
    ///
    /// Fails on the first root that cannot be installed.
    pub fn apply(&self, query: &mut Query<'_>) -> Result<(), QueryError> {
        if let Some(platform) = self.resolve.platform {
            query.platform(platform);
        }
        for (key, value) in &self.facts {
            query.fact(key, value.as_str());
        }
        for id in &self.resolve.exclude {
            query.exclude(id);
        }
        for prefix in &self.resolve.exclude_prefix {
            query.exclude_prefix(prefix);
        }
        for root in &self.resolve.roots {
            query.install_spec(root)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::CapabilityIndex;
    use tempfile::TempDir;
    use unitgraph_schema::{Arch, Os, UnitRecord, Version};

    const FULL: &str = r#"
[project]
name = "demo"

[resolve]
units = "units.json"
platform = "gtk.linux.x86_64"
roots = ["app", "lib@1.0.0"]
exclude = ["lib.tests"]
exclude-prefix = ["org.junit"]
fail-on-unmet = true

[facts]
"Mode" = "dev"
"#;

    #[test]
    fn test_parse_full() {
        let manifest = ResolveManifest::parse(FULL).unwrap();
        assert_eq!(manifest.project.unwrap().name, "demo");
        assert_eq!(
            manifest.resolve.platform,
            Some(Platform::native(Os::Linux, Arch::X86_64))
        );
        assert_eq!(manifest.resolve.roots, ["app", "lib@1.0.0"]);
        assert_eq!(manifest.resolve.exclude_prefix, ["org.junit"]);
        assert!(manifest.resolve.fail_on_unmet);
        assert_eq!(manifest.facts.get("Mode").map(String::as_str), Some("dev"));
    }

    #[test]
    fn test_parse_empty_is_default() {
        assert_eq!(ResolveManifest::parse("").unwrap(), ResolveManifest::default());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ResolveManifest::parse("[resolve]\nplatform = \"beos.x86\"\n"),
            Err(ManifestError::Parse(_))
        ));
        assert!(matches!(
            ResolveManifest::parse("[resolve]\nroot = [\"typo\"]\n"),
            Err(ManifestError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ResolveManifest::load(&dir.path().join(MANIFEST_FILE)).unwrap_err();
        assert!(matches!(err, ManifestError::Io { .. }));
    }

    #[test]
    fn test_find_walks_up() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(ResolveManifest::find(&nested), None);

        std::fs::write(dir.path().join(MANIFEST_FILE), FULL).unwrap();
        let found = ResolveManifest::find(&nested).unwrap();
        assert_eq!(found, dir.path().join(MANIFEST_FILE));

        let manifest = ResolveManifest::load(&found).unwrap();
        assert_eq!(
            manifest.units_path(dir.path()),
            Some(dir.path().join("units.json"))
        );
    }

    #[test]
    fn test_apply() {
        let v = |s: &str| Version::parse(s).unwrap();
        let index = CapabilityIndex::populate(vec![
            UnitRecord::new("app", v("2.0.0")),
            UnitRecord::new("lib", v("1.0.0")),
            UnitRecord::new("lib", v("1.5.0")),
        ])
        .unwrap();
        let manifest = ResolveManifest::parse(FULL).unwrap();

        let mut query = Query::new(&index);
        manifest.apply(&mut query).unwrap();

        let roots: Vec<String> = query.roots().iter().map(|u| u.to_string()).collect();
        assert_eq!(roots, ["app@2.0.0", "lib@1.0.0"]);
        assert_eq!(query.environment().get("osgi.ws"), Some("gtk"));
        assert_eq!(query.environment().get("mode"), Some("dev"));
    }

    #[test]
    fn test_apply_unknown_root() {
        let index = CapabilityIndex::populate(Vec::new()).unwrap();
        let manifest = ResolveManifest::parse("[resolve]\nroots = [\"ghost\"]\n").unwrap();
        let err = manifest.apply(&mut Query::new(&index)).unwrap_err();
        assert!(matches!(err, QueryError::Index(_)));
    }
}
