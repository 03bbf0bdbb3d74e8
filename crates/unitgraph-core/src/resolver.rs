//! Transitive closure over the capability index.
//!
//! Resolution never fails because of the shape of the graph: missing
//! providers and ambiguous choices are recorded as diagnostics on the
//! [`Resolution`] and the walk carries on. Cycles are broken by the
//! resolved-set membership check, and the walk uses an explicit stack so
//! deep requirement chains cannot overflow the call stack.

use crate::error::IndexError;
use crate::filter::Environment;
use crate::index::{CapabilityIndex, Requirement, Unit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use unitgraph_schema::{RequiredCapability, UnitId, UnitProperties, Version};

/// Units that must never enter a resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exclusions {
    ids: BTreeSet<UnitId>,
    prefixes: Vec<String>,
}

impl Exclusions {
    /// No exclusions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude every version of `id`.
    pub fn exclude(&mut self, id: impl Into<UnitId>) {
        self.ids.insert(id.into());
    }

    /// Exclude every unit whose id starts with `prefix`.
    pub fn exclude_prefix(&mut self, prefix: impl Into<String>) {
        self.prefixes.push(prefix.into());
    }

    /// True if `unit` is excluded.
    pub fn contains(&self, unit: &Unit) -> bool {
        self.ids.contains(unit.id().as_str())
            || self
                .prefixes
                .iter()
                .any(|p| unit.id().starts_with(p.as_str()))
    }

    /// True if nothing is excluded.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty() && self.prefixes.is_empty()
    }
}

/// A mandatory requirement that nothing provides.
#[derive(Debug, Clone, Copy)]
pub struct UnmetRequirement<'a> {
    /// The unit declaring the requirement.
    pub unit: &'a Unit,
    /// The requirement nobody satisfies.
    pub requirement: &'a Requirement,
}

/// A requirement with several providers, settled by taking the first.
#[derive(Debug, Clone, Copy)]
pub struct AmbiguousResolution<'a> {
    /// The unit declaring the requirement.
    pub unit: &'a Unit,
    /// The requirement.
    pub requirement: &'a Requirement,
    /// The provider that was followed.
    pub chosen: &'a Unit,
    /// How many eligible providers there were.
    pub candidates: usize,
}

/// The closure of one or more root units.
///
/// Borrows units from the index it was computed against; the index itself
/// is never modified.
#[derive(Debug, Clone)]
pub struct Resolution<'a> {
    index: &'a CapabilityIndex,
    resolved: Vec<&'a Unit>,
    members: Vec<bool>,
    unmet: Vec<UnmetRequirement<'a>>,
    ambiguous: Vec<AmbiguousResolution<'a>>,
}

impl<'a> Resolution<'a> {
    fn empty(index: &'a CapabilityIndex) -> Self {
        Self {
            index,
            resolved: Vec::new(),
            members: vec![false; index.len()],
            unmet: Vec::new(),
            ambiguous: Vec::new(),
        }
    }

    /// Returns false if the unit was already resolved.
    fn insert(&mut self, unit: &'a Unit) -> bool {
        let seen = &mut self.members[unit.slot()];
        if *seen {
            return false;
        }
        *seen = true;
        self.resolved.push(unit);
        true
    }

    /// Resolved units in the order the walk discovered them.
    pub fn resolved(&self) -> &[&'a Unit] {
        &self.resolved
    }

    /// True if `unit` is part of the closure.
    pub fn contains(&self, unit: &Unit) -> bool {
        self.index
            .member(unit)
            .is_ok_and(|own| self.members[own.slot()])
    }

    /// Number of resolved units.
    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    /// True if nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Mandatory requirements with no provider.
    pub fn unmet(&self) -> &[UnmetRequirement<'a>] {
        &self.unmet
    }

    /// Requirements settled by picking the first of several providers.
    pub fn ambiguous(&self) -> &[AmbiguousResolution<'a>] {
        &self.ambiguous
    }

    /// True if every applicable mandatory requirement was satisfied.
    pub fn is_complete(&self) -> bool {
        self.unmet.is_empty()
    }

    /// Coordinates of resolved units that are published on a public
    /// artifact repository, in resolved order.
    pub fn public_coordinates(&self) -> Vec<String> {
        self.resolved
            .iter()
            .filter_map(|u| u.public_coordinate())
            .collect()
    }

    /// Resolved units with no public coordinate, leaving out features and
    /// categories since those are never materialized as artifacts.
    pub fn units_without_public_coordinate(&self) -> Vec<&'a Unit> {
        self.resolved
            .iter()
            .copied()
            .filter(|u| u.public_coordinate().is_none() && !u.is_abstract())
            .collect()
    }

    /// An owned, serializable snapshot for downstream tooling.
    pub fn report(&self) -> ResolutionReport {
        ResolutionReport {
            resolved: self.resolved.iter().map(|u| UnitSummary::of(u)).collect(),
            coordinates: self.public_coordinates(),
            without_coordinate: self
                .units_without_public_coordinate()
                .into_iter()
                .map(UnitSummary::of)
                .collect(),
            unmet: self
                .unmet
                .iter()
                .map(|u| UnmetEntry {
                    unit: UnitSummary::of(u.unit),
                    requirement: u.requirement.to_record(),
                })
                .collect(),
            ambiguous: self
                .ambiguous
                .iter()
                .map(|a| AmbiguousEntry {
                    unit: UnitSummary::of(a.unit),
                    requirement: a.requirement.to_record(),
                    chosen: UnitSummary::of(a.chosen),
                    candidates: a.candidates,
                })
                .collect(),
        }
    }
}

/// Identity of a unit in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSummary {
    /// Unit id.
    pub id: UnitId,
    /// Unit version.
    pub version: Version,
}

impl UnitSummary {
    fn of(unit: &Unit) -> Self {
        Self {
            id: unit.id().clone(),
            version: unit.version().clone(),
        }
    }
}

/// An unmet requirement in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmetEntry {
    /// Declaring unit.
    pub unit: UnitSummary,
    /// The unmet requirement.
    pub requirement: RequiredCapability,
}

/// An ambiguous resolution in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousEntry {
    /// Declaring unit.
    pub unit: UnitSummary,
    /// The requirement.
    pub requirement: RequiredCapability,
    /// The provider that was followed.
    pub chosen: UnitSummary,
    /// How many eligible providers there were.
    pub candidates: usize,
}

/// Owned form of a [`Resolution`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Resolved units in discovery order.
    pub resolved: Vec<UnitSummary>,
    /// Public repository coordinates, in resolved order.
    pub coordinates: Vec<String>,
    /// Resolved, non-abstract units with no public coordinate.
    pub without_coordinate: Vec<UnitSummary>,
    /// Unmet mandatory requirements.
    pub unmet: Vec<UnmetEntry>,
    /// Requirements settled by picking the first provider.
    pub ambiguous: Vec<AmbiguousEntry>,
}

/// Walks requirements through a sealed index.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    index: &'a CapabilityIndex,
    environment: &'a Environment,
    exclusions: Option<&'a Exclusions>,
}

impl<'a> Resolver<'a> {
    /// A resolver evaluating requirement filters against `environment`.
    pub fn new(index: &'a CapabilityIndex, environment: &'a Environment) -> Self {
        Self {
            index,
            environment,
            exclusions: None,
        }
    }

    /// Never add units matched by `exclusions`.
    pub fn with_exclusions(mut self, exclusions: &'a Exclusions) -> Self {
        self.exclusions = Some(exclusions);
        self
    }

    /// The closure of a single root.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnitNotInIndex`] if `root` does not belong to
    /// the index this resolver reads.
    pub fn resolve(&self, root: &Unit) -> Result<Resolution<'a>, IndexError> {
        self.resolve_all([root])
    }

    /// The union of the closures of `roots`, walked in the given order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnitNotInIndex`] if any root does not belong to
    /// the index this resolver reads. Nothing is resolved in that case.
    pub fn resolve_all<'r>(
        &self,
        roots: impl IntoIterator<Item = &'r Unit>,
    ) -> Result<Resolution<'a>, IndexError> {
        let roots = roots
            .into_iter()
            .map(|root| self.index.member(root))
            .collect::<Result<Vec<_>, _>>()?;

        let mut resolution = Resolution::empty(self.index);
        for root in roots {
            if self.is_excluded(root) {
                tracing::debug!("Root {root} is excluded, skipping");
                continue;
            }
            self.walk(root, &mut resolution);
        }

        tracing::debug!(
            "Resolved {} units ({} unmet, {} ambiguous)",
            resolution.resolved.len(),
            resolution.unmet.len(),
            resolution.ambiguous.len()
        );
        Ok(resolution)
    }

    fn is_excluded(&self, unit: &Unit) -> bool {
        self.exclusions.is_some_and(|e| e.contains(unit))
    }

    /// Depth-first, each unit's requirements in declaration order.
    ///
    /// An ambiguous choice is recorded once the chosen provider's own
    /// requirements have been walked, so nested choices come first.
    fn walk(&self, root: &'a Unit, resolution: &mut Resolution<'a>) {
        if !resolution.insert(root) {
            return;
        }

        let mut stack = vec![Frame::new(root, None)];
        while let Some(frame) = stack.last_mut() {
            let unit = frame.unit;
            let Some(requirement) = unit.requires().get(frame.next) else {
                if let Some(ambiguous) = frame.ambiguous.take() {
                    resolution.ambiguous.push(ambiguous);
                }
                stack.pop();
                continue;
            };
            frame.next += 1;

            let Some((provider, ambiguous)) = self.choose(unit, requirement, resolution) else {
                continue;
            };
            if resolution.insert(provider) {
                tracing::trace!("{unit} -> {provider} via {requirement}");
                stack.push(Frame::new(provider, ambiguous));
            } else if let Some(ambiguous) = ambiguous {
                resolution.ambiguous.push(ambiguous);
            }
        }
    }

    /// Picks the provider to follow for one requirement, recording unmet
    /// requirements. An ambiguous choice is handed back to the caller.
    fn choose(
        &self,
        unit: &'a Unit,
        requirement: &'a Requirement,
        resolution: &mut Resolution<'a>,
    ) -> Option<(&'a Unit, Option<AmbiguousResolution<'a>>)> {
        if let Some(filter) = requirement.filter() {
            if !filter.matches(self.environment) {
                tracing::trace!("{unit}: {requirement} does not apply here");
                return None;
            }
        }

        let bucket = self.index.bucket_for(requirement);
        let mut eligible = bucket.providers().filter(|p| !self.is_excluded(p));

        let Some(chosen) = eligible.next() else {
            if bucket.is_empty() && !requirement.is_optional() {
                tracing::trace!("{unit}: nothing provides {requirement}");
                resolution.unmet.push(UnmetRequirement { unit, requirement });
            } else {
                tracing::trace!("{unit}: skipping {requirement}");
            }
            return None;
        };

        let others = eligible.count();
        let ambiguous = (others > 0).then_some(AmbiguousResolution {
            unit,
            requirement,
            chosen,
            candidates: others + 1,
        });
        Some((chosen, ambiguous))
    }
}

/// A unit whose requirements are being walked.
struct Frame<'a> {
    unit: &'a Unit,
    /// Index of the next requirement to visit.
    next: usize,
    /// The choice that led here, recorded when the frame is popped.
    ambiguous: Option<AmbiguousResolution<'a>>,
}

impl<'a> Frame<'a> {
    fn new(unit: &'a Unit, ambiguous: Option<AmbiguousResolution<'a>>) -> Self {
        Self {
            unit,
            next: 0,
            ambiguous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitgraph_schema::{
        Arch, Os, PROP_MAVEN_ARTIFACT_ID, PROP_MAVEN_GROUP_ID, PROP_MAVEN_VERSION,
        PROP_TYPE_CATEGORY, PROP_TYPE_FEATURE, Platform, RequiredCapability, UnitRecord,
    };

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn bundle(id: &str) -> UnitRecord {
        bundle_at(id, "1.0.0")
    }

    fn bundle_at(id: &str, version: &str) -> UnitRecord {
        UnitRecord::new(id, v(version)).providing("osgi.bundle", id)
    }

    fn needs(name: &str) -> RequiredCapability {
        RequiredCapability::new("osgi.bundle", name)
    }

    fn ids(resolution: &Resolution<'_>) -> Vec<String> {
        resolution
            .resolved()
            .iter()
            .map(|u| u.id().to_string())
            .collect()
    }

    fn resolve_in(index: &CapabilityIndex, env: &Environment, root: &str) -> Vec<String> {
        let root = index.unit_by_id(root).unwrap();
        ids(&Resolver::new(index, env).resolve(root).unwrap())
    }

    #[test]
    fn test_zero_requirement_unit() {
        let index = CapabilityIndex::populate(vec![bundle("a"), bundle("b")]).unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(ids(&resolution), ["a"]);
        assert!(resolution.unmet().is_empty());
        assert!(resolution.ambiguous().is_empty());
    }

    #[test]
    fn test_single_provider() {
        let index =
            CapabilityIndex::populate(vec![bundle("a").requiring(needs("b")), bundle("b")])
                .unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(ids(&resolution), ["a", "b"]);
        assert!(resolution.ambiguous().is_empty());
        assert!(resolution.is_complete());
    }

    #[test]
    fn test_multi_provider_takes_first_in_order() {
        let index = CapabilityIndex::populate(vec![
            bundle("a").requiring(RequiredCapability::new("java.package", "c")),
            UnitRecord::new("d", v("2.0.0")).providing("java.package", "c"),
            UnitRecord::new("b", v("1.0.0")).providing("java.package", "c"),
        ])
        .unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(ids(&resolution), ["a", "b"]);
        assert!(resolution.unmet().is_empty());
        assert_eq!(resolution.ambiguous().len(), 1);

        let ambiguous = resolution.ambiguous()[0];
        assert_eq!(ambiguous.unit.id(), "a");
        assert_eq!(ambiguous.requirement.capability().name, "c");
        assert_eq!(ambiguous.chosen.id(), "b");
        assert_eq!(ambiguous.candidates, 2);
    }

    #[test]
    fn test_nested_ambiguity_is_recorded_first() {
        let index = CapabilityIndex::populate(vec![
            bundle("a")
                .requiring(RequiredCapability::new("java.package", "c"))
                .requiring(needs("z")),
            UnitRecord::new("b", v("1.0.0"))
                .providing("java.package", "c")
                .requiring(RequiredCapability::new("java.package", "e")),
            UnitRecord::new("d", v("1.0.0")).providing("java.package", "c"),
            UnitRecord::new("f", v("1.0.0")).providing("java.package", "e"),
            UnitRecord::new("g", v("1.0.0")).providing("java.package", "e"),
            bundle("z").requiring(RequiredCapability::new("java.package", "c")),
        ])
        .unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(ids(&resolution), ["a", "b", "f", "z"]);
        let declared_by: Vec<&str> = resolution
            .ambiguous()
            .iter()
            .map(|a| a.unit.id().as_str())
            .collect();
        // z's choice of b is settled at once since b is already resolved.
        assert_eq!(declared_by, ["b", "a", "z"]);
        let chosen: Vec<&str> = resolution
            .ambiguous()
            .iter()
            .map(|a| a.chosen.id().as_str())
            .collect();
        assert_eq!(chosen, ["f", "b", "b"]);
    }

    #[test]
    fn test_contains_matches_by_id_and_version() {
        let index = CapabilityIndex::populate(vec![bundle("a"), bundle("b")]).unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert!(resolution.contains(index.unit_by_id("a").unwrap()));
        assert!(!resolution.contains(index.unit_by_id("b").unwrap()));

        // Same units, different positions.
        let other = CapabilityIndex::populate(vec![bundle("0"), bundle("a")]).unwrap();
        assert!(resolution.contains(other.unit_by_id("a").unwrap()));
        assert!(!resolution.contains(other.unit_by_id("0").unwrap()));
        let newer = CapabilityIndex::populate(vec![bundle_at("a", "2.0.0")]).unwrap();
        assert!(!resolution.contains(newer.unit_by_id("a").unwrap()));
    }

    #[test]
    fn test_versions_of_one_id_order_providers() {
        let index = CapabilityIndex::populate(vec![
            bundle("a").requiring(needs("lib")),
            bundle_at("lib", "2.0.0"),
            bundle_at("lib", "1.0.0"),
        ])
        .unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(resolution.resolved()[1].version(), &v("1.0.0"));
        assert_eq!(resolution.ambiguous()[0].chosen.version(), &v("1.0.0"));
    }

    #[test]
    fn test_unmet_requirement() {
        let index = CapabilityIndex::populate(vec![bundle("a").requiring(needs("c"))]).unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(ids(&resolution), ["a"]);
        assert_eq!(resolution.unmet().len(), 1);
        assert_eq!(resolution.unmet()[0].unit.id(), "a");
        assert_eq!(resolution.unmet()[0].requirement.capability().name, "c");
        assert!(!resolution.is_complete());
    }

    #[test]
    fn test_optional_requirement_without_provider_is_silent() {
        let index =
            CapabilityIndex::populate(vec![bundle("a").requiring(needs("c").optional())]).unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(ids(&resolution), ["a"]);
        assert!(resolution.unmet().is_empty());
    }

    #[test]
    fn test_optional_requirement_with_provider_is_followed() {
        let index = CapabilityIndex::populate(vec![
            bundle("a").requiring(needs("b").optional()),
            bundle("b"),
        ])
        .unwrap();
        assert_eq!(resolve_in(&index, &Environment::new(), "a"), ["a", "b"]);
    }

    #[test]
    fn test_cycles_terminate() {
        let index = CapabilityIndex::populate(vec![
            bundle("a").requiring(needs("b")),
            bundle("b").requiring(needs("c")),
            bundle("c").requiring(needs("a")).requiring(needs("c")),
        ])
        .unwrap();
        assert_eq!(resolve_in(&index, &Environment::new(), "a"), ["a", "b", "c"]);
    }

    #[test]
    fn test_depth_first_declaration_order() {
        // a -> (b -> d), c
        let index = CapabilityIndex::populate(vec![
            bundle("a").requiring(needs("b")).requiring(needs("c")),
            bundle("b").requiring(needs("d")),
            bundle("c"),
            bundle("d"),
        ])
        .unwrap();
        assert_eq!(
            resolve_in(&index, &Environment::new(), "a"),
            ["a", "b", "d", "c"]
        );
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let depth = 50_000;
        let records = (0..depth).map(|i| {
            let record = bundle(&format!("n{i:06}"));
            if i + 1 < depth {
                record.requiring(needs(&format!("n{:06}", i + 1)))
            } else {
                record
            }
        });
        let index = CapabilityIndex::populate(records).unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("n000000").unwrap())
            .unwrap();
        assert_eq!(resolution.len(), depth);
    }

    #[test]
    fn test_filters_gate_requirements() {
        let index = CapabilityIndex::populate(vec![
            bundle("swt")
                .requiring(needs("swt.gtk").with_filter("(&(osgi.os=linux)(osgi.ws=gtk))"))
                .requiring(needs("swt.win32").with_filter("(osgi.os=win32)")),
            bundle("swt.gtk"),
        ])
        .unwrap();

        let linux = Environment::for_platform(Platform::native(Os::Linux, Arch::X86_64));
        let on_linux = Resolver::new(&index, &linux)
            .resolve(index.unit_by_id("swt").unwrap())
            .unwrap();
        assert_eq!(ids(&on_linux), ["swt", "swt.gtk"]);
        // The win32 fragment does not exist, but its filter rejects it, so it is not unmet.
        assert!(on_linux.unmet().is_empty());

        let windows = Environment::for_platform(Platform::native(Os::Win32, Arch::X86_64));
        let on_windows = Resolver::new(&index, &windows)
            .resolve(index.unit_by_id("swt").unwrap())
            .unwrap();
        assert_eq!(ids(&on_windows), ["swt"]);
        assert_eq!(on_windows.unmet().len(), 1);
    }

    #[test]
    fn test_exclusions() {
        let index = CapabilityIndex::populate(vec![
            bundle("a")
                .requiring(needs("b"))
                .requiring(RequiredCapability::new("java.package", "p")),
            bundle("b"),
            UnitRecord::new("test.impl", v("1.0.0")).providing("java.package", "p"),
            UnitRecord::new("z.impl", v("1.0.0")).providing("java.package", "p"),
        ])
        .unwrap();
        let env = Environment::new();

        let mut exclusions = Exclusions::new();
        exclusions.exclude("b");
        exclusions.exclude_prefix("test.");
        let resolution = Resolver::new(&index, &env)
            .with_exclusions(&exclusions)
            .resolve(index.unit_by_id("a").unwrap())
            .unwrap();

        assert_eq!(ids(&resolution), ["a", "z.impl"]);
        // b existed but was excluded: skipped, not unmet.
        assert!(resolution.unmet().is_empty());
        // Only one eligible provider remained for p.
        assert!(resolution.ambiguous().is_empty());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let records = || {
            vec![
                bundle("root")
                    .requiring(RequiredCapability::new("java.package", "api"))
                    .requiring(needs("missing"))
                    .requiring(needs("x")),
                UnitRecord::new("impl.b", v("1.0.0"))
                    .providing("java.package", "api")
                    .requiring(needs("x")),
                UnitRecord::new("impl.a", v("1.0.0")).providing("java.package", "api"),
                bundle("x").requiring(needs("root")),
            ]
        };
        let forward = CapabilityIndex::populate(records()).unwrap();
        let backward = CapabilityIndex::populate(records().into_iter().rev()).unwrap();
        let env = Environment::new();

        let run = |index: &CapabilityIndex| {
            Resolver::new(index, &env)
                .resolve(index.unit_by_id("root").unwrap())
                .unwrap()
                .report()
        };
        let first = run(&forward);
        assert_eq!(first, run(&forward));
        assert_eq!(first, run(&backward));
        assert_eq!(first.ambiguous[0].chosen.id, "impl.a");
        assert_eq!(first.unmet[0].requirement.name, "missing");
    }

    #[test]
    fn test_resolve_all_unions_roots() {
        let index = CapabilityIndex::populate(vec![
            bundle("a").requiring(needs("shared")),
            bundle("b").requiring(needs("shared")),
            bundle("shared"),
        ])
        .unwrap();
        let env = Environment::new();
        let roots = [index.unit_by_id("b").unwrap(), index.unit_by_id("a").unwrap()];
        let resolution = Resolver::new(&index, &env).resolve_all(roots).unwrap();
        assert_eq!(ids(&resolution), ["b", "shared", "a"]);
    }

    #[test]
    fn test_foreign_root_is_rejected() {
        let index = CapabilityIndex::populate(vec![bundle("a")]).unwrap();
        let other = CapabilityIndex::populate(vec![bundle("z")]).unwrap();
        let env = Environment::new();
        let err = Resolver::new(&index, &env)
            .resolve(other.unit_by_id("z").unwrap())
            .unwrap_err();
        assert!(matches!(err, IndexError::UnitNotInIndex(_)));
    }

    #[test]
    fn test_derived_views() {
        let index = CapabilityIndex::populate(vec![
            bundle("root")
                .with_property(PROP_TYPE_CATEGORY, "true")
                .requiring(needs("x"))
                .requiring(needs("y"))
                .requiring(needs("z")),
            bundle("x")
                .with_property(PROP_MAVEN_GROUP_ID, "g")
                .with_property(PROP_MAVEN_ARTIFACT_ID, "a")
                .with_property(PROP_MAVEN_VERSION, "1.0"),
            bundle("y").with_property(PROP_TYPE_FEATURE, "true"),
            bundle("z").with_property(PROP_TYPE_FEATURE, "false"),
        ])
        .unwrap();
        let env = Environment::new();
        let resolution = Resolver::new(&index, &env)
            .resolve(index.unit_by_id("root").unwrap())
            .unwrap();

        assert_eq!(resolution.public_coordinates(), ["g:a:1.0"]);
        let without: Vec<&str> = resolution
            .units_without_public_coordinate()
            .iter()
            .map(|u| u.id().as_str())
            .collect();
        assert_eq!(without, ["z"]);

        let report = resolution.report();
        assert_eq!(report.coordinates, ["g:a:1.0"]);
        assert_eq!(report.without_coordinate[0].id, "z");
        assert_eq!(report.resolved.len(), 4);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["resolved"][0]["id"], "root");
        assert_eq!(json["resolved"][0]["version"], "1.0.0");
        assert_eq!(json["unmet"], serde_json::json!([]));
    }

    #[test]
    fn test_concurrent_resolutions_share_index() {
        let index = CapabilityIndex::populate(vec![
            bundle("a").requiring(needs("b").with_filter("(osgi.os=linux)")),
            bundle("b"),
        ])
        .unwrap();
        let linux = Environment::for_platform(Platform::native(Os::Linux, Arch::Aarch64));
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| resolve_in(&index, &linux, "a")))
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), ["a", "b"]);
            }
        });
    }
}
