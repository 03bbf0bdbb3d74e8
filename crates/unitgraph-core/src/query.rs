//! Root selection on top of a populated index.
//!
//! A [`Query`] collects the target platform, extra environment facts,
//! exclusions, and the root units to install, then hands everything to the
//! [`Resolver`].

use crate::error::QueryError;
use crate::filter::Environment;
use crate::index::{CapabilityIndex, Unit};
use crate::resolver::{Exclusions, Resolution, Resolver};
use unitgraph_schema::{PLATFORM_PLACEHOLDER, Platform, Version};

/// Selects roots and resolves them against one index.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    index: &'a CapabilityIndex,
    platform: Option<Platform>,
    environment: Environment,
    exclusions: Exclusions,
    roots: Vec<&'a Unit>,
}

impl<'a> Query<'a> {
    /// An empty query: no platform, no facts, no roots.
    pub fn new(index: &'a CapabilityIndex) -> Self {
        Self {
            index,
            platform: None,
            environment: Environment::new(),
            exclusions: Exclusions::new(),
            roots: Vec::new(),
        }
    }

    /// Target `platform`: sets its environment facts and enables
    /// placeholder substitution in unit ids.
    pub fn platform(&mut self, platform: Platform) -> &mut Self {
        self.environment.set_platform(platform);
        self.platform = Some(platform);
        self
    }

    /// Add or replace an environment fact.
    pub fn fact(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.environment.set(key, value);
        self
    }

    /// Never resolve any version of `id`.
    pub fn exclude(&mut self, id: &str) -> &mut Self {
        self.exclusions.exclude(id);
        self
    }

    /// Never resolve units whose id starts with `prefix`.
    pub fn exclude_prefix(&mut self, prefix: &str) -> &mut Self {
        self.exclusions.exclude_prefix(prefix);
        self
    }

    fn unit_id(&self, id: &str) -> Result<String, QueryError> {
        if !id.contains(PLATFORM_PLACEHOLDER) {
            return Ok(id.to_string());
        }
        self.platform
            .map(|platform| platform.substitute(id))
            .ok_or_else(|| QueryError::NoPlatform(id.to_string()))
    }

    fn add_root(&mut self, unit: &'a Unit) {
        if !self.roots.contains(&unit) {
            self.roots.push(unit);
        }
    }

    /// Add the highest version of `id` as a root.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoPlatform`] if `id` contains the platform
    /// placeholder and no platform is set, or [`QueryError::Index`] if the
    /// id is unknown.
    pub fn install(&mut self, id: &str) -> Result<&'a Unit, QueryError> {
        let id = self.unit_id(id)?;
        let unit = self.index.unit_by_id(&id)?;
        self.add_root(unit);
        Ok(unit)
    }

    /// Add an exact version of `id` as a root.
    ///
    /// # Errors
    ///
    /// As [`Query::install`], plus a version mismatch.
    pub fn install_version(&mut self, id: &str, version: &Version) -> Result<&'a Unit, QueryError> {
        let id = self.unit_id(id)?;
        let unit = self.index.unit(&id, version)?;
        self.add_root(unit);
        Ok(unit)
    }

    /// Add a root from `id` or `id@version`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidSpec`] for an empty id or version,
    /// [`QueryError::Version`] for an unparsable version, and otherwise as
    /// [`Query::install`].
    pub fn install_spec(&mut self, spec: &str) -> Result<&'a Unit, QueryError> {
        let spec = spec.trim();
        match spec.split_once('@') {
            Some((id, version)) => {
                if id.is_empty() || version.is_empty() {
                    return Err(QueryError::InvalidSpec(spec.to_string()));
                }
                let version = Version::parse(version).map_err(|source| QueryError::Version {
                    spec: spec.to_string(),
                    source,
                })?;
                self.install_version(id, &version)
            }
            None if spec.is_empty() => Err(QueryError::InvalidSpec(spec.to_string())),
            None => self.install(spec),
        }
    }

    /// Add every unit whose properties satisfy `filter` as a root.
    ///
    /// Returns how many units matched.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Filter`] if the filter does not parse.
    pub fn install_matching(&mut self, filter: &str) -> Result<usize, QueryError> {
        let filter = self.index.compile_filter(filter)?;
        let index = self.index;
        let mut matched = 0;
        for unit in index.units().iter().filter(|u| filter.matches(*u)) {
            self.add_root(unit);
            matched += 1;
        }
        tracing::debug!("{matched} units match {filter}");
        Ok(matched)
    }

    /// The selected roots, in insertion order.
    pub fn roots(&self) -> &[&'a Unit] {
        &self.roots
    }

    /// The facts requirement filters are evaluated against.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// The target platform, if one was set.
    pub fn target_platform(&self) -> Option<Platform> {
        self.platform
    }

    /// Resolve every root, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::NoRoots`] if nothing was installed.
    pub fn resolve(&self) -> Result<Resolution<'_>, QueryError> {
        if self.roots.is_empty() {
            return Err(QueryError::NoRoots);
        }
        let resolver = Resolver::new(self.index, &self.environment);
        let resolver = if self.exclusions.is_empty() {
            resolver
        } else {
            resolver.with_exclusions(&self.exclusions)
        };
        Ok(resolver.resolve_all(self.roots.iter().copied())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;
    use unitgraph_schema::{Arch, Os, RequiredCapability, UnitRecord};

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn bundle(id: &str, version: &str) -> UnitRecord {
        UnitRecord::new(id, v(version)).providing("osgi.bundle", id)
    }

    fn swt_index() -> CapabilityIndex {
        CapabilityIndex::populate(vec![
            bundle("org.eclipse.swt", "3.120.0").requiring(
                RequiredCapability::new("osgi.bundle", "org.eclipse.swt.gtk.linux.x86_64")
                    .with_filter("(&(osgi.ws=gtk)(osgi.os=linux)(osgi.arch=x86_64))"),
            ),
            bundle("org.eclipse.swt.gtk.linux.x86_64", "3.120.0"),
            bundle("org.eclipse.swt.cocoa.macosx.aarch64", "3.120.0"),
            bundle("org.eclipse.jface", "3.30.0"),
            bundle("org.eclipse.jface", "3.31.0"),
        ])
        .unwrap()
    }

    #[test]
    fn test_install_picks_highest_version() {
        let index = swt_index();
        let mut query = Query::new(&index);
        let unit = query.install("org.eclipse.jface").unwrap();
        assert_eq!(unit.version(), &v("3.31.0"));
        assert_eq!(query.roots().len(), 1);
    }

    #[test]
    fn test_install_unknown() {
        let index = swt_index();
        let err = Query::new(&index).install("nope").unwrap_err();
        assert_eq!(err, QueryError::Index(IndexError::UnitNotFound("nope".into())));
    }

    #[test]
    fn test_platform_placeholder() {
        let index = swt_index();

        let err = Query::new(&index)
            .install("org.eclipse.swt.${osgi.platform}")
            .unwrap_err();
        assert!(matches!(err, QueryError::NoPlatform(_)));

        let mut query = Query::new(&index);
        query.platform(Platform::native(Os::Macosx, Arch::Aarch64));
        let unit = query.install("org.eclipse.swt.${osgi.platform}").unwrap();
        assert_eq!(unit.id(), "org.eclipse.swt.cocoa.macosx.aarch64");
        assert_eq!(query.environment().get("osgi.os"), Some("macosx"));
    }

    #[test]
    fn test_platform_drives_filters() {
        let index = swt_index();

        let mut linux = Query::new(&index);
        linux.platform(Platform::native(Os::Linux, Arch::X86_64));
        linux.install("org.eclipse.swt").unwrap();
        assert_eq!(linux.resolve().unwrap().len(), 2);

        let mut mac = Query::new(&index);
        mac.platform(Platform::native(Os::Macosx, Arch::Aarch64));
        mac.install("org.eclipse.swt").unwrap();
        let resolution = mac.resolve().unwrap();
        assert_eq!(resolution.len(), 1);
        assert!(resolution.is_complete());
    }

    #[test]
    fn test_install_spec() {
        let index = swt_index();
        let mut query = Query::new(&index);

        let unit = query.install_spec("org.eclipse.jface@3.30.0").unwrap();
        assert_eq!(unit.version(), &v("3.30.0"));

        let unit = query.install_spec("org.eclipse.swt").unwrap();
        assert_eq!(unit.id(), "org.eclipse.swt");

        assert!(matches!(
            query.install_spec("org.eclipse.jface@"),
            Err(QueryError::InvalidSpec(_))
        ));
        assert!(matches!(
            query.install_spec("org.eclipse.jface@x.y"),
            Err(QueryError::Version { .. })
        ));
        assert!(matches!(
            query.install_spec("org.eclipse.jface@9.9.9"),
            Err(QueryError::Index(IndexError::VersionNotFound { .. }))
        ));
        assert_eq!(query.roots().len(), 2);
    }

    #[test]
    fn test_install_matching() {
        let index = CapabilityIndex::populate(vec![
            bundle("a", "1.0.0").with_property("org.eclipse.equinox.p2.type.group", "true"),
            bundle("b", "1.0.0").with_property("org.eclipse.equinox.p2.type.group", "false"),
            bundle("c", "1.0.0").with_property("org.eclipse.equinox.p2.type.group", "true"),
            bundle("d", "1.0.0"),
        ])
        .unwrap();
        let mut query = Query::new(&index);
        let matched = query
            .install_matching("(org.eclipse.equinox.p2.type.group=true)")
            .unwrap();
        assert_eq!(matched, 2);
        let ids: Vec<&str> = query.roots().iter().map(|u| u.id().as_str()).collect();
        assert_eq!(ids, ["a", "c"]);

        assert!(matches!(
            query.install_matching("(broken"),
            Err(QueryError::Filter(_))
        ));
    }

    #[test]
    fn test_roots_are_deduplicated() {
        let index = swt_index();
        let mut query = Query::new(&index);
        query.install("org.eclipse.swt").unwrap();
        query.install("org.eclipse.swt").unwrap();
        assert_eq!(query.roots().len(), 1);
    }

    #[test]
    fn test_resolve_without_roots() {
        let index = swt_index();
        let err = Query::new(&index).resolve().unwrap_err();
        assert_eq!(err, QueryError::NoRoots);
    }

    #[test]
    fn test_exclusions_and_facts() {
        let index = CapabilityIndex::populate(vec![
            bundle("app", "1.0.0")
                .requiring(RequiredCapability::new("osgi.bundle", "dev.tools").with_filter("(mode=dev)"))
                .requiring(RequiredCapability::new("osgi.bundle", "org.slf4j.simple")),
            bundle("dev.tools", "1.0.0"),
            bundle("org.slf4j.simple", "2.0.0"),
        ])
        .unwrap();

        let mut query = Query::new(&index);
        query.fact("mode", "dev").exclude_prefix("org.slf4j");
        query.install("app").unwrap();
        let resolution = query.resolve().unwrap();
        let ids: Vec<&str> = resolution.resolved().iter().map(|u| u.id().as_str()).collect();
        assert_eq!(ids, ["app", "dev.tools"]);
        assert!(resolution.is_complete());

        let mut query = Query::new(&index);
        query.exclude("app");
        query.install("app").unwrap();
        assert!(query.resolve().unwrap().is_empty());
    }
}
