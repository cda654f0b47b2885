//! Conditions over the option set and the platform snapshot.

use std::fmt;

use serde::Serialize;

use crate::options::OptionSet;
use crate::platform::{OsVersion, PlatformContext};

/// A pure condition evaluated against `(OptionSet, PlatformContext)`.
///
/// Version comparisons use the release (major.minor) of the host, so
/// `10.9.5` counts as Mavericks for `OsAtMost(MAVERICKS)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Always,
    Option(String),
    OsAtLeast(OsVersion),
    OsAtMost(OsVersion),
    OsBelow(OsVersion),
    ToolchainPresent,
    Not(Box<Predicate>),
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn option(name: impl Into<String>) -> Self {
        Predicate::Option(name.into())
    }

    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    pub fn evaluate(&self, options: &OptionSet, platform: &PlatformContext) -> bool {
        let release = platform.os_version.release();
        match self {
            Predicate::Always => true,
            Predicate::Option(name) => options.contains(name),
            Predicate::OsAtLeast(v) => release >= *v,
            Predicate::OsAtMost(v) => release <= *v,
            Predicate::OsBelow(v) => release < *v,
            Predicate::ToolchainPresent => platform.toolchain_present,
            Predicate::Not(inner) => !inner.evaluate(options, platform),
            Predicate::Any(list) => list.iter().any(|p| p.evaluate(options, platform)),
            Predicate::All(list) => list.iter().all(|p| p.evaluate(options, platform)),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, list: &[Predicate], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, p) in list.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", p)?;
    }
    write!(f, ")")
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Always => write!(f, "always"),
            Predicate::Option(name) => write!(f, "with-{}", name),
            Predicate::OsAtLeast(v) => write!(f, "os >= {}", v),
            Predicate::OsAtMost(v) => write!(f, "os <= {}", v),
            Predicate::OsBelow(v) => write!(f, "os < {}", v),
            Predicate::ToolchainPresent => write!(f, "toolchain"),
            Predicate::Not(inner) => write!(f, "!{}", inner),
            Predicate::Any(list) => join(f, list, "||"),
            Predicate::All(list) => join(f, list, "&&"),
        }
    }
}
