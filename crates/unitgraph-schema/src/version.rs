//! Unit versions.
//!
//! Units use the four-part `major.minor.micro.qualifier` scheme common to
//! module repositories (e.g. `3.118.0.v20221104-1300`). Missing numeric
//! segments default to zero and the qualifier compares as a plain string,
//! so `1.0` == `1.0.0` < `1.0.0.a` < `1.0.0.b` < `1.0.1`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a [`Version`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The version string was empty.
    #[error("Empty version string")]
    Empty,

    /// A numeric segment was missing or not a non-negative integer.
    #[error("Invalid {segment} segment in version '{input}'")]
    InvalidNumber {
        /// Which segment failed (`major`, `minor` or `micro`).
        segment: &'static str,
        /// The full input that was being parsed.
        input: String,
    },

    /// The qualifier contained characters other than `[A-Za-z0-9_-]`.
    #[error("Invalid qualifier in version '{0}'")]
    InvalidQualifier(String),
}

/// An ordered `major.minor.micro.qualifier` version.
///
/// Field order matters: the derived `Ord` compares `major`, then `minor`,
/// then `micro`, then `qualifier`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

impl Version {
    /// Create a version from numeric parts with an empty qualifier.
    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if the string is empty, a numeric segment is
    /// not an integer, or the qualifier contains illegal characters.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut parts = trimmed.splitn(4, '.');
        let number = |part: Option<&str>, segment: &'static str| -> Result<u32, VersionError> {
            match part {
                None => Ok(0),
                Some(p) => p.parse::<u32>().map_err(|_| VersionError::InvalidNumber {
                    segment,
                    input: input.to_string(),
                }),
            }
        };

        let major = number(parts.next(), "major")?;
        let minor = number(parts.next(), "minor")?;
        let micro = number(parts.next(), "micro")?;
        let qualifier = parts.next().unwrap_or_default();

        if !qualifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(VersionError::InvalidQualifier(input.to_string()));
        }

        Ok(Self {
            major,
            minor,
            micro,
            qualifier: qualifier.to_string(),
        })
    }

    /// The major segment.
    pub fn major(&self) -> u32 {
        self.major
    }

    /// The minor segment.
    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// The micro segment.
    pub fn micro(&self) -> u32 {
        self.micro
    }

    /// The qualifier, empty if none was given.
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.to_string()
    }
}
