//! User configuration (`config.toml`).
//!
//! Lookup order: an explicit path, `$HTTPD_RECIPES_CONFIG`, then
//! `<config dir>/httpd-recipes/config.toml`. Only the default location may
//! be missing; a missing explicit file is an error.
//!
//! ```toml
//! root = "/opt/homebrew"
//! jobs = 8
//!
//! [platform]
//! os_version = "10.13"
//! toolchain = true
//!
//! [providers]
//! openssl = "/opt/openssl-1.1"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::deps::OptLookup;
use crate::platform::{OsVersion, PlatformContext, VersionError};

pub const CONFIG_ENV: &str = "HTTPD_RECIPES_CONFIG";
pub const DEFAULT_ROOT: &str = "/usr/local";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlatformOverrides {
    pub os_version: Option<String>,
    pub toolchain: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub root: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub platform: PlatformOverrides,
    pub providers: BTreeMap<String, PathBuf>,
}

fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("httpd-recipes").join("config.toml"))
}

impl Config {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::read(Path::new(&path));
        }
        match default_path() {
            Some(path) if path.is_file() => {
                tracing::debug!(path = %path.display(), "loading config");
                Self::read(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Later values win.
    pub fn merge(&mut self, other: Config) {
        if other.root.is_some() {
            self.root = other.root;
        }
        if other.source_dir.is_some() {
            self.source_dir = other.source_dir;
        }
        if other.jobs.is_some() {
            self.jobs = other.jobs;
        }
        if other.platform.os_version.is_some() {
            self.platform.os_version = other.platform.os_version;
        }
        if other.platform.toolchain.is_some() {
            self.platform.toolchain = other.platform.toolchain;
        }
        self.providers.extend(other.providers);
    }

    pub fn root(&self) -> PathBuf {
        self.root
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get).max(1)
    }

    /// The platform snapshot: overrides where given, host probe otherwise.
    pub fn platform(&self) -> Result<PlatformContext, VersionError> {
        let mut ctx = match &self.platform.os_version {
            Some(v) => PlatformContext::new(v.parse::<OsVersion>()?, false),
            None => PlatformContext::detect()?,
        };
        if let Some(toolchain) = self.platform.toolchain {
            ctx.toolchain_present = toolchain;
        } else if self.platform.os_version.is_some() {
            ctx.toolchain_present = PlatformContext::toolchain_installed();
        }
        Ok(ctx)
    }

    pub fn lookup(&self) -> OptLookup {
        OptLookup::new(self.root()).with_overrides(self.providers.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_full() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
root = "/opt/homebrew"
jobs = 3

[platform]
os_version = "high sierra"
toolchain = false

[providers]
openssl = "/opt/openssl"
"#,
        )
        .unwrap();

        let config = Config::read(&path).unwrap();
        assert_eq!(config.root(), PathBuf::from("/opt/homebrew"));
        assert_eq!(config.jobs(), 3);
        assert_eq!(config.providers["openssl"], PathBuf::from("/opt/openssl"));

        let platform = config.platform().unwrap();
        assert_eq!(platform.os_version, OsVersion::new(10, 13, 0));
        assert!(!platform.toolchain_present);
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.root(), PathBuf::from("/usr/local"));
        assert!(config.jobs() >= 1);
    }

    #[test]
    fn test_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        assert!(matches!(Config::load(Some(missing.as_path())), Err(ConfigError::Read { .. })));

        let bad = temp.path().join("bad.toml");
        std::fs::write(&bad, "root = [").unwrap();
        assert!(matches!(Config::read(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_merge() {
        let mut base = Config {
            root: Some(PathBuf::from("/usr/local")),
            jobs: Some(2),
            ..Default::default()
        };
        base.merge(Config {
            root: Some(PathBuf::from("/opt/brew")),
            ..Default::default()
        });
        assert_eq!(base.root(), PathBuf::from("/opt/brew"));
        assert_eq!(base.jobs(), 2);
    }
}
