//! Decoded installable-unit records.
//!
//! A [`UnitRecord`] is the input contract between the metadata fetcher and
//! the resolution engine: identity, version, properties, and the
//! capabilities the unit provides and requires. The engine never parses a
//! repository format itself, it only consumes these records.

use crate::types::{Capability, UnitId};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Property flag marking a unit as a feature (an abstract grouping unit).
pub const PROP_TYPE_FEATURE: &str = "org.eclipse.equinox.p2.type.group";

/// Property flag marking a unit as a category (an abstract grouping unit).
pub const PROP_TYPE_CATEGORY: &str = "org.eclipse.equinox.p2.type.category";

/// Maven group id of the artifact mirrored on a public repository.
pub const PROP_MAVEN_GROUP_ID: &str = "maven-groupId";

/// Maven artifact id of the artifact mirrored on a public repository.
pub const PROP_MAVEN_ARTIFACT_ID: &str = "maven-artifactId";

/// Maven version of the artifact mirrored on a public repository.
pub const PROP_MAVEN_VERSION: &str = "maven-version";

/// Errors raised by [`UnitRecord::validate`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// A required field is empty.
    #[error("Empty field: {0}")]
    EmptyField(&'static str),

    /// A provided or required capability has an empty namespace or name.
    #[error("Unit '{unit}' has a capability with an empty namespace or name")]
    EmptyCapability {
        /// The unit declaring the capability.
        unit: UnitId,
    },
}

/// A capability requirement as declared by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredCapability {
    /// Namespace of the required bucket.
    pub namespace: String,
    /// Name of the required bucket.
    pub name: String,
    /// LDAP-style filter over environment facts; the requirement only
    /// applies when the filter matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Optional requirements are silently skipped when nothing provides them.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl RequiredCapability {
    /// A mandatory, unfiltered requirement on `(namespace, name)`.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            filter: None,
            optional: false,
        }
    }

    /// Guard this requirement with a filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Mark this requirement optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// The bucket this requirement refers to.
    pub fn capability(&self) -> Capability {
        Capability::new(self.namespace.clone(), self.name.clone())
    }
}

/// An installable unit as decoded from repository metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    /// Symbolic identifier.
    pub id: UnitId,
    /// Unit version.
    pub version: Version,
    /// Free-form string properties (feature/category flags, maven coordinates, ...).
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    /// Capabilities this unit provides, in declaration order.
    #[serde(default)]
    pub provides: Vec<Capability>,
    /// Capabilities this unit requires, in declaration order.
    #[serde(default)]
    pub requires: Vec<RequiredCapability>,
}

impl UnitRecord {
    /// Create a record with no properties, capabilities or requirements.
    pub fn new(id: impl Into<UnitId>, version: Version) -> Self {
        Self {
            id: id.into(),
            version,
            properties: BTreeMap::new(),
            provides: Vec::new(),
            requires: Vec::new(),
        }
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a provided capability.
    pub fn providing(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.provides.push(Capability::new(namespace, name));
        self
    }

    /// Add a requirement.
    pub fn requiring(mut self, requirement: RequiredCapability) -> Self {
        self.requires.push(requirement);
        self
    }

    /// Checks the record is structurally usable by the index.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::EmptyField`] if the id is empty, or
    /// [`RecordError::EmptyCapability`] if any provided or required
    /// capability has an empty namespace or name.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.id.is_empty() {
            return Err(RecordError::EmptyField("id"));
        }

        let provided = self
            .provides
            .iter()
            .map(|c| (c.namespace.as_str(), c.name.as_str()));
        let required = self
            .requires
            .iter()
            .map(|r| (r.namespace.as_str(), r.name.as_str()));

        if provided
            .chain(required)
            .any(|(ns, name)| ns.is_empty() || name.is_empty())
        {
            return Err(RecordError::EmptyCapability {
                unit: self.id.clone(),
            });
        }

        Ok(())
    }
}

/// Read access to the well-known unit properties.
///
/// Implemented for plain property maps so decoded records and indexed units
/// interpret flags and coordinates the same way.
pub trait UnitProperties {
    /// Look up a raw property value.
    fn property(&self, key: &str) -> Option<&str>;

    /// True if the property is present and equal to `"true"`.
    fn flag(&self, key: &str) -> bool {
        self.property(key) == Some("true")
    }

    /// True if the unit is a feature.
    fn is_feature(&self) -> bool {
        self.flag(PROP_TYPE_FEATURE)
    }

    /// True if the unit is a category.
    fn is_category(&self) -> bool {
        self.flag(PROP_TYPE_CATEGORY)
    }

    /// Features and categories only group other units and never map to an artifact.
    fn is_abstract(&self) -> bool {
        self.is_feature() || self.is_category()
    }

    /// The `group:artifact:version` coordinate on a public artifact
    /// repository, if all three maven properties are present and non-empty.
    fn public_coordinate(&self) -> Option<String> {
        let part = |key: &str| self.property(key).filter(|v| !v.is_empty());
        let group = part(PROP_MAVEN_GROUP_ID)?;
        let artifact = part(PROP_MAVEN_ARTIFACT_ID)?;
        let version = part(PROP_MAVEN_VERSION)?;
        Some(format!("{group}:{artifact}:{version}"))
    }
}

impl UnitProperties for BTreeMap<String, String> {
    fn property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }
}

impl UnitProperties for UnitRecord {
    fn property(&self, key: &str) -> Option<&str> {
        self.properties.property(key)
    }
}
