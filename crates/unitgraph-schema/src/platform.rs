//! Target platform triples.
//!
//! A platform is a `ws.os.arch` triple (e.g. `gtk.linux.x86_64`). It is
//! used two ways: as environment facts for filter evaluation, and as the
//! substitution for the `${osgi.platform}` placeholder in unit ids that
//! have one variant per platform.
//!
//! Detecting the running machine's platform is the caller's job.
//!
//! # Example
//!
//! ```
//! use unitgraph_schema::{Arch, Platform};
//!
//! let platform: Platform = "cocoa.macosx.aarch64".parse().unwrap();
//! assert_eq!(platform.arch, Arch::Aarch64);
//! assert_eq!(platform.to_string(), "cocoa.macosx.aarch64");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Placeholder substituted with the platform triple.
pub const PLATFORM_PLACEHOLDER: &str = "${osgi.platform}";

/// Environment fact key for the windowing system.
pub const FACT_WS: &str = "osgi.ws";

/// Environment fact key for the operating system.
pub const FACT_OS: &str = "osgi.os";

/// Environment fact key for the architecture.
pub const FACT_ARCH: &str = "osgi.arch";

/// Errors from parsing platform components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Unknown windowing system.
    #[error("Unknown windowing system: {0}")]
    UnknownWs(String),

    /// Unknown operating system.
    #[error("Unknown operating system: {0}")]
    UnknownOs(String),

    /// Unknown architecture.
    #[error("Unknown architecture: {0}")]
    UnknownArch(String),

    /// Not a `ws.os.arch` or `os.arch` string.
    #[error("Malformed platform '{0}', expected ws.os.arch")]
    Malformed(String),
}

/// Windowing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ws {
    /// GTK (Linux).
    Gtk,
    /// Cocoa (macOS).
    Cocoa,
    /// Win32 (Windows).
    Win32,
}

/// Operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    /// Linux.
    Linux,
    /// macOS.
    Macosx,
    /// Windows.
    Win32,
}

/// Processor architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// `x86_64` / amd64.
    #[serde(rename = "x86_64")]
    X86_64,
    /// 64-bit ARM.
    Aarch64,
    /// 64-bit little-endian POWER.
    Ppc64le,
}

impl Ws {
    /// Name as it appears in filters and platform triples.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gtk => "gtk",
            Self::Cocoa => "cocoa",
            Self::Win32 => "win32",
        }
    }
}

impl Os {
    /// Name as it appears in filters and platform triples.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::Macosx => "macosx",
            Self::Win32 => "win32",
        }
    }

    /// The windowing system that ships with this operating system.
    pub fn native_ws(&self) -> Ws {
        match self {
            Self::Linux => Ws::Gtk,
            Self::Macosx => Ws::Cocoa,
            Self::Win32 => Ws::Win32,
        }
    }
}

impl Arch {
    /// Name as it appears in filters and platform triples.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Ppc64le => "ppc64le",
        }
    }
}

impl FromStr for Ws {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gtk" => Ok(Self::Gtk),
            "cocoa" => Ok(Self::Cocoa),
            "win32" => Ok(Self::Win32),
            _ => Err(PlatformError::UnknownWs(s.to_string())),
        }
    }
}

impl FromStr for Os {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "macosx" | "macos" | "darwin" => Ok(Self::Macosx),
            "win32" | "windows" => Ok(Self::Win32),
            _ => Err(PlatformError::UnknownOs(s.to_string())),
        }
    }
}

impl FromStr for Arch {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            "ppc64le" => Ok(Self::Ppc64le),
            _ => Err(PlatformError::UnknownArch(s.to_string())),
        }
    }
}

/// A `ws.os.arch` platform triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    /// Windowing system.
    pub ws: Ws,
    /// Operating system.
    pub os: Os,
    /// Architecture.
    pub arch: Arch,
}

impl Platform {
    /// Build a platform from its parts.
    pub fn new(ws: Ws, os: Os, arch: Arch) -> Self {
        Self { ws, os, arch }
    }

    /// A platform using the operating system's native windowing system.
    pub fn native(os: Os, arch: Arch) -> Self {
        Self::new(os.native_ws(), os, arch)
    }

    /// The `(key, value)` environment facts this platform contributes to
    /// filter evaluation.
    pub fn facts(&self) -> [(&'static str, &'static str); 3] {
        [
            (FACT_WS, self.ws.as_str()),
            (FACT_OS, self.os.as_str()),
            (FACT_ARCH, self.arch.as_str()),
        ]
    }

    /// Replace every [`PLATFORM_PLACEHOLDER`] in `name` with this platform.
    pub fn substitute(&self, name: &str) -> String {
        name.replace(PLATFORM_PLACEHOLDER, &self.to_string())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.ws.as_str(),
            self.os.as_str(),
            self.arch.as_str()
        )
    }
}

impl FromStr for Platform {
    type Err = PlatformError;

    /// Accepts `ws.os.arch`, or `os.arch` with the native windowing system.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [ws, os, arch] => Ok(Self::new(ws.parse()?, os.parse()?, arch.parse()?)),
            [os, arch] => Ok(Self::native(os.parse()?, arch.parse()?)),
            _ => Err(PlatformError::Malformed(s.to_string())),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = PlatformError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(p: Platform) -> Self {
        p.to_string()
    }
}
