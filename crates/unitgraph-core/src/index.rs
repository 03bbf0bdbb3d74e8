//! In-memory capability index.
//!
//! The index holds every known unit, sorted by `(id, version)`, and one
//! provider bucket per `(namespace, name)` capability that any unit provides
//! or requires. It is built in one shot by [`CapabilityIndex::populate`] and
//! never mutated afterwards, so any number of resolutions can share it.
//!
//! Units refer to buckets (and buckets to units) by position rather than by
//! pointer, which keeps the structure acyclic and cheap to share.

use crate::error::IndexError;
use crate::filter::{Facts, Filter, FilterCache, FilterError};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use unitgraph_schema::{
    Capability, RequiredCapability, UnitId, UnitProperties, UnitRecord, Version,
};

/// An indexed, immutable installable unit.
///
/// Equality and ordering use `(id, version)` only.
#[derive(Debug)]
pub struct Unit {
    slot: usize,
    id: UnitId,
    version: Version,
    properties: BTreeMap<String, String>,
    /// Property values keyed by lowercased name, for filter evaluation.
    facts: HashMap<String, String>,
    provides: Vec<Capability>,
    requires: Vec<Requirement>,
}

impl Unit {
    /// Symbolic id.
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    /// Version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// All properties.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Provided capabilities in declaration order.
    pub fn provides(&self) -> &[Capability] {
        &self.provides
    }

    /// Requirements in declaration order.
    pub fn requires(&self) -> &[Requirement] {
        &self.requires
    }

    pub(crate) fn slot(&self) -> usize {
        self.slot
    }

    fn key(&self) -> (&str, &Version) {
        (self.id.as_str(), &self.version)
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Unit {}

impl PartialOrd for Unit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Unit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

impl UnitProperties for Unit {
    fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

impl Facts for Unit {
    fn fact(&self, key: &str) -> Option<&str> {
        self.facts.get(key).map(String::as_str)
    }
}

/// Lowercase property names once. A name that is already lowercase wins
/// over other spellings of it, then the first in key order.
fn lowercase_keys(properties: &BTreeMap<String, String>) -> HashMap<String, String> {
    let mut facts = HashMap::with_capacity(properties.len());
    for (key, value) in properties {
        let lowered = key.to_lowercase();
        if lowered == *key {
            facts.insert(lowered, value.clone());
        } else {
            facts.entry(lowered).or_insert_with(|| value.clone());
        }
    }
    facts
}

/// A requirement declared by an indexed unit, bound to its provider bucket.
#[derive(Debug, Clone)]
pub struct Requirement {
    capability: Capability,
    bucket: usize,
    filter: Option<(String, Arc<Filter>)>,
    optional: bool,
}

impl Requirement {
    /// The required capability.
    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    /// The compiled guard filter, if any.
    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref().map(|(_, f)| f.as_ref())
    }

    /// The guard filter as written in the metadata.
    pub fn raw_filter(&self) -> Option<&str> {
        self.filter.as_ref().map(|(raw, _)| raw.as_str())
    }

    /// True if the requirement may go unsatisfied.
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Convert back into the record form used by reports.
    pub fn to_record(&self) -> RequiredCapability {
        RequiredCapability {
            namespace: self.capability.namespace.clone(),
            name: self.capability.name.clone(),
            filter: self.raw_filter().map(str::to_string),
            optional: self.optional,
        }
    }

    pub(crate) fn bucket(&self) -> usize {
        self.bucket
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.capability)?;
        if let Some(raw) = self.raw_filter() {
            write!(f, " {raw}")?;
        }
        if self.optional {
            write!(f, " (optional)")?;
        }
        Ok(())
    }
}

/// Providers of one bucket.
///
/// Almost every capability has exactly one provider, so the single case is
/// stored inline and only the rare multi-provider bucket allocates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Providers {
    #[default]
    Empty,
    Single(usize),
    Many(Vec<usize>),
}

impl Providers {
    /// Units are registered in ascending slot order, so a repeat can only be
    /// the most recent entry.
    fn add(&mut self, slot: usize) {
        *self = match std::mem::take(self) {
            Self::Empty => Self::Single(slot),
            Self::Single(existing) if existing == slot => Self::Single(existing),
            Self::Single(existing) => Self::Many(vec![existing, slot]),
            Self::Many(mut slots) => {
                if slots.last() != Some(&slot) {
                    slots.push(slot);
                }
                Self::Many(slots)
            }
        };
    }

    fn sort(&mut self) {
        if let Self::Many(slots) = self {
            slots.sort_unstable();
            slots.shrink_to_fit();
        }
    }

    fn as_slice(&self) -> &[usize] {
        match self {
            Self::Empty => &[],
            Self::Single(slot) => std::slice::from_ref(slot),
            Self::Many(slots) => slots,
        }
    }
}

#[derive(Debug)]
struct BucketData {
    capability: Capability,
    providers: Providers,
}

/// Handle to the provider bucket of one `(namespace, name)` pair.
///
/// Two handles for the same pair compare equal. Providers are listed in
/// unit order, so [`Bucket::first_provider`] is deterministic.
#[derive(Clone, Copy)]
pub struct Bucket<'a> {
    namespace: &'a str,
    name: &'a str,
    providers: &'a [usize],
    units: &'a [Unit],
}

impl<'a> Bucket<'a> {
    /// Capability namespace.
    pub fn namespace(&self) -> &'a str {
        self.namespace
    }

    /// Capability name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Providers in unit order.
    pub fn providers(&self) -> impl Iterator<Item = &'a Unit> + use<'a> {
        let (providers, units) = (self.providers, self.units);
        providers.iter().map(move |&slot| &units[slot])
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// True if nothing provides this capability.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// True if exactly one unit provides this capability.
    pub fn has_only_one_provider(&self) -> bool {
        self.providers.len() == 1
    }

    /// The lowest-ordered provider.
    pub fn first_provider(&self) -> Option<&'a Unit> {
        let units = self.units;
        self.providers.first().map(|&slot| &units[slot])
    }
}

impl PartialEq for Bucket<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.name == other.name
    }
}

impl Eq for Bucket<'_> {}

impl fmt::Debug for Bucket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("providers", &self.providers.len())
            .finish()
    }
}

/// Size summary of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Distinct `(id, version)` units.
    pub units: usize,
    /// Distinct `(namespace, name)` buckets.
    pub buckets: usize,
    /// Buckets with more than one provider.
    pub multi_provider_buckets: usize,
    /// Buckets that are required but provided by nothing.
    pub unprovided_buckets: usize,
    /// Distinct filter expressions compiled so far.
    pub compiled_filters: usize,
}

/// All known units plus the capability → provider mapping.
#[derive(Debug)]
pub struct CapabilityIndex {
    units: Vec<Unit>,
    buckets: Vec<BucketData>,
    by_capability: HashMap<String, HashMap<String, usize>>,
    filters: FilterCache,
}

impl CapabilityIndex {
    /// Build the index from a batch of decoded records.
    ///
    /// Units are sorted by `(id, version)`; when the same `(id, version)`
    /// appears more than once, the first record wins. Every requirement
    /// filter is compiled here, so a malformed filter aborts the build.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::InvalidRecord`] for a structurally invalid
    /// record and [`IndexError::Filter`] for an unparsable filter.
    pub fn populate(records: impl IntoIterator<Item = UnitRecord>) -> Result<Self, IndexError> {
        let mut records: Vec<UnitRecord> = records.into_iter().collect();
        for (position, record) in records.iter().enumerate() {
            record
                .validate()
                .map_err(|source| IndexError::InvalidRecord { position, source })?;
        }

        // Stable, so the first of several duplicates stays in front.
        records.sort_by(|a, b| (&a.id, &a.version).cmp(&(&b.id, &b.version)));
        let before = records.len();
        records.dedup_by(|later, first| {
            let duplicate = later.id == first.id && later.version == first.version;
            if duplicate {
                tracing::warn!(
                    "Ignoring duplicate unit {}@{}",
                    later.id,
                    later.version
                );
            }
            duplicate
        });
        tracing::debug!(
            "Indexing {} units ({} duplicates dropped)",
            records.len(),
            before - records.len()
        );

        let mut index = Self {
            units: Vec::with_capacity(records.len()),
            buckets: Vec::new(),
            by_capability: HashMap::new(),
            filters: FilterCache::new(),
        };

        for (slot, record) in records.into_iter().enumerate() {
            let unit = index.register(slot, record)?;
            index.units.push(unit);
        }

        for bucket in &mut index.buckets {
            bucket.providers.sort();
        }

        let stats = index.stats();
        tracing::debug!(
            "Index ready: {} units, {} buckets ({} with several providers, {} unprovided), {} distinct filters",
            stats.units,
            stats.buckets,
            stats.multi_provider_buckets,
            stats.unprovided_buckets,
            stats.compiled_filters
        );

        Ok(index)
    }

    fn register(&mut self, slot: usize, record: UnitRecord) -> Result<Unit, IndexError> {
        let UnitRecord {
            id,
            version,
            properties,
            provides,
            requires,
        } = record;

        for capability in &provides {
            let bucket = self.bucket_slot(capability);
            self.buckets[bucket].providers.add(slot);
        }

        let mut bound = Vec::with_capacity(requires.len());
        for required in requires {
            let capability = required.capability();
            let bucket = self.bucket_slot(&capability);
            let filter = match required.filter {
                Some(raw) => {
                    let compiled =
                        self.filters
                            .compile(&raw)
                            .map_err(|source| IndexError::Filter {
                                unit: format!("{id}@{version}"),
                                source,
                            })?;
                    Some((raw, compiled))
                }
                None => None,
            };
            bound.push(Requirement {
                capability,
                bucket,
                filter,
                optional: required.optional,
            });
        }

        tracing::trace!(
            "Registered {id}@{version}: provides {}, requires {}",
            provides.len(),
            bound.len()
        );

        Ok(Unit {
            slot,
            id,
            version,
            facts: lowercase_keys(&properties),
            properties,
            provides,
            requires: bound,
        })
    }

    fn bucket_slot(&mut self, capability: &Capability) -> usize {
        let names = self
            .by_capability
            .entry(capability.namespace.clone())
            .or_default();
        if let Some(&slot) = names.get(&capability.name) {
            return slot;
        }
        let slot = self.buckets.len();
        names.insert(capability.name.clone(), slot);
        self.buckets.push(BucketData {
            capability: capability.clone(),
            providers: Providers::Empty,
        });
        slot
    }

    /// All units in `(id, version)` order.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True if the index holds no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Every version of `id`, oldest first. Empty if the id is unknown.
    pub fn units_by_id(&self, id: &str) -> &[Unit] {
        let start = self.units.partition_point(|u| u.id.as_str() < id);
        let end = self.units.partition_point(|u| u.id.as_str() <= id);
        &self.units[start..end]
    }

    /// The highest version of `id`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnitNotFound`] if no unit has this id.
    pub fn unit_by_id(&self, id: &str) -> Result<&Unit, IndexError> {
        self.units_by_id(id)
            .last()
            .ok_or_else(|| IndexError::UnitNotFound(id.to_string()))
    }

    /// The unit with exactly this id and version.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnitNotFound`] if the id is unknown, or
    /// [`IndexError::VersionNotFound`] if it exists at other versions only.
    pub fn unit(&self, id: &str, version: &Version) -> Result<&Unit, IndexError> {
        let versions = self.units_by_id(id);
        if versions.is_empty() {
            return Err(IndexError::UnitNotFound(id.to_string()));
        }
        versions
            .binary_search_by(|u| u.version.cmp(version))
            .map(|at| &versions[at])
            .map_err(|_| IndexError::VersionNotFound {
                id: id.to_string(),
                version: version.to_string(),
            })
    }

    /// This index's copy of `unit`, matched by `(id, version)`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::UnitNotInIndex`] if no such unit is indexed.
    pub fn member(&self, unit: &Unit) -> Result<&Unit, IndexError> {
        if let Some(own) = self.units.get(unit.slot) {
            if own == unit {
                return Ok(own);
            }
        }
        self.unit(unit.id.as_str(), &unit.version)
            .map_err(|_| IndexError::UnitNotInIndex(unit.to_string()))
    }

    /// The bucket for `(namespace, name)`.
    ///
    /// Pairs nobody provides or requires yield an empty bucket; the index
    /// itself is not modified.
    pub fn requirement<'a>(&'a self, namespace: &'a str, name: &'a str) -> Bucket<'a> {
        match self
            .by_capability
            .get(namespace)
            .and_then(|names| names.get(name))
        {
            Some(&slot) => self.bucket_at(slot),
            None => Bucket {
                namespace,
                name,
                providers: &[],
                units: &self.units,
            },
        }
    }

    /// The bucket a requirement is bound to.
    pub fn bucket_for(&self, requirement: &Requirement) -> Bucket<'_> {
        self.bucket_at(requirement.bucket())
    }

    fn bucket_at(&self, slot: usize) -> Bucket<'_> {
        let data = &self.buckets[slot];
        Bucket {
            namespace: &data.capability.namespace,
            name: &data.capability.name,
            providers: data.providers.as_slice(),
            units: &self.units,
        }
    }

    /// Compile a filter through the index's shared cache.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the filter does not parse.
    pub fn compile_filter(&self, raw: &str) -> Result<Arc<Filter>, FilterError> {
        self.filters.compile(raw)
    }

    /// Summary counts.
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            units: self.units.len(),
            buckets: self.buckets.len(),
            multi_provider_buckets: self
                .buckets
                .iter()
                .filter(|b| matches!(b.providers, Providers::Many(_)))
                .count(),
            unprovided_buckets: self
                .buckets
                .iter()
                .filter(|b| b.providers == Providers::Empty)
                .count(),
            compiled_filters: self.filters.len(),
        }
    }
}
