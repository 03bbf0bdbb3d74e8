//! Capability index and dependency resolution for installable units.
//!
//! The flow is always the same:
//!
//! 1. decode repository metadata into [`UnitRecord`]s (not done here);
//! 2. build a [`CapabilityIndex`] with [`CapabilityIndex::populate`];
//! 3. pick roots and a target platform with a [`Query`];
//! 4. read the [`Resolution`]: resolved units, public coordinates, and the
//!    unmet and ambiguous diagnostics.
//!
//! ```
//! use unitgraph_core::{CapabilityIndex, Query};
//! use unitgraph_schema::{RequiredCapability, UnitRecord, Version};
//!
//! let index = CapabilityIndex::populate(vec![
//!     UnitRecord::new("app", Version::new(1, 0, 0))
//!         .requiring(RequiredCapability::new("osgi.bundle", "lib")),
//!     UnitRecord::new("lib", Version::new(2, 0, 0)).providing("osgi.bundle", "lib"),
//! ])
//! .unwrap();
//!
//! let mut query = Query::new(&index);
//! query.install("app").unwrap();
//! let resolution = query.resolve().unwrap();
//! assert_eq!(resolution.len(), 2);
//! assert!(resolution.is_complete());
//! ```
//!
//! [`UnitRecord`]: unitgraph_schema::UnitRecord

pub mod error;
pub mod filter;
pub mod index;
pub mod manifest;
pub mod query;
pub mod resolver;

pub use error::{IndexError, QueryError};
pub use filter::{Environment, Facts, Filter, FilterCache, FilterError};
pub use index::{Bucket, CapabilityIndex, IndexStats, Requirement, Unit};
pub use manifest::{MANIFEST_FILE, ManifestError, ResolveManifest};
pub use query::Query;
pub use resolver::{
    AmbiguousResolution, Exclusions, Resolution, ResolutionReport, Resolver, UnmetRequirement,
};
