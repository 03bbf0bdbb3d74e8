//! Domain-specific errors for indexing and querying

use crate::filter::FilterError;
use thiserror::Error;
use unitgraph_schema::{RecordError, VersionError};

/// Errors raised while building or reading a [`CapabilityIndex`](crate::index::CapabilityIndex).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// A record handed to `populate` is structurally invalid.
    #[error("Invalid unit record at position {position}: {source}")]
    InvalidRecord {
        /// Position of the record in the input batch.
        position: usize,
        /// What was wrong with it.
        #[source]
        source: RecordError,
    },

    /// A requirement declared a filter that does not parse.
    #[error("Unit '{unit}' has a malformed requirement filter: {source}")]
    Filter {
        /// `id@version` of the declaring unit.
        unit: String,
        /// The parse failure.
        #[source]
        source: FilterError,
    },

    /// No unit with this id exists.
    #[error("No such unit id '{0}'")]
    UnitNotFound(String),

    /// The id exists but not at this version.
    #[error("No version {version} of unit '{id}'")]
    VersionNotFound {
        /// The requested id.
        id: String,
        /// The requested version.
        version: String,
    },

    /// A unit handed to the resolver does not belong to this index.
    #[error("Unit '{0}' is not a member of this index")]
    UnitNotInIndex(String),
}

/// Errors raised while selecting roots with a [`Query`](crate::query::Query).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Lookup against the index failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// A query filter does not parse.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A version in a unit spec does not parse.
    #[error("Invalid version in '{spec}': {source}")]
    Version {
        /// The `id@version` text being parsed.
        spec: String,
        /// The parse failure.
        #[source]
        source: VersionError,
    },

    /// A unit spec is not `id` or `id@version`.
    #[error("Invalid unit spec '{0}'")]
    InvalidSpec(String),

    /// A unit id uses the platform placeholder but no platform was set.
    #[error("Unit id '{0}' needs a platform but none was set")]
    NoPlatform(String),

    /// `resolve` was called before any root was selected.
    #[error("No root units selected")]
    NoRoots,
}
