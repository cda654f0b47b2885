//! Host platform snapshot consumed by selection predicates.
//!
//! OS versions are macOS-style `major.minor[.patch]` tokens. Release names
//! (`mavericks`, `sierra`, ...) parse to their version numbers, so recipes can
//! state thresholds the way release notes do.

use std::fmt;
use std::process::Command;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VersionError {
    #[error("invalid OS version: {0}")]
    InvalidFormat(String),
    #[error("could not probe host platform: {0}")]
    Probe(String),
}

/// A comparable OS version token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Named releases, oldest first.
const RELEASES: &[(&str, OsVersion)] = &[
    ("leopard", OsVersion::new(10, 5, 0)),
    ("snow_leopard", OsVersion::new(10, 6, 0)),
    ("lion", OsVersion::new(10, 7, 0)),
    ("mountain_lion", OsVersion::new(10, 8, 0)),
    ("mavericks", OsVersion::new(10, 9, 0)),
    ("yosemite", OsVersion::new(10, 10, 0)),
    ("el_capitan", OsVersion::new(10, 11, 0)),
    ("sierra", OsVersion::new(10, 12, 0)),
    ("high_sierra", OsVersion::new(10, 13, 0)),
    ("mojave", OsVersion::new(10, 14, 0)),
];

impl OsVersion {
    pub const MAVERICKS: OsVersion = OsVersion::new(10, 9, 0);
    pub const SIERRA: OsVersion = OsVersion::new(10, 12, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The release name for this version's major.minor, if known.
    pub fn release_name(&self) -> Option<&'static str> {
        RELEASES
            .iter()
            .find(|(_, v)| v.major == self.major && v.minor == self.minor)
            .map(|(name, _)| *name)
    }

    /// Version with the patch component dropped, as release thresholds compare.
    pub fn release(&self) -> OsVersion {
        OsVersion::new(self.major, self.minor, 0)
    }
}

impl FromStr for OsVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(VersionError::InvalidFormat("empty version".to_string()));
        }

        let key = s.to_ascii_lowercase().replace([' ', '-'], "_");
        if let Some((_, v)) = RELEASES.iter().find(|(name, _)| *name == key) {
            return Ok(*v);
        }

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionError::InvalidFormat(s.to_string()));
        }

        let component = |idx: usize| -> Result<u32, VersionError> {
            parts
                .get(idx)
                .map(|p| p.parse::<u32>())
                .transpose()
                .map_err(|_| VersionError::InvalidFormat(s.to_string()))
                .map(|v| v.unwrap_or(0))
        };

        Ok(OsVersion::new(component(0)?, component(1)?, component(2)?))
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if self.patch != 0 {
            write!(f, ".{}", self.patch)?;
        }
        Ok(())
    }
}

impl Serialize for OsVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Read-only snapshot of the host's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlatformContext {
    pub os_version: OsVersion,
    /// Command-line developer tools are installed
    pub toolchain_present: bool,
}

impl PlatformContext {
    pub fn new(os_version: OsVersion, toolchain_present: bool) -> Self {
        Self {
            os_version,
            toolchain_present,
        }
    }

    /// Whether `xcode-select -p` reports an installed developer directory.
    pub fn toolchain_installed() -> bool {
        Command::new("xcode-select")
            .arg("-p")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// Probe the running host via `sw_vers` and `xcode-select`.
    pub fn detect() -> Result<Self, VersionError> {
        let output = Command::new("sw_vers")
            .arg("-productVersion")
            .output()
            .map_err(|e| VersionError::Probe(format!("sw_vers: {}", e)))?;
        if !output.status.success() {
            return Err(VersionError::Probe("sw_vers exited unsuccessfully".to_string()));
        }
        let os_version: OsVersion = String::from_utf8_lossy(&output.stdout).parse()?;

        let toolchain_present = Self::toolchain_installed();

        tracing::debug!(%os_version, toolchain_present, "probed host platform");
        Ok(Self::new(os_version, toolchain_present))
    }
}
