//! Dependency slots and provider selection.
//!
//! Each slot holds an ordered rule table. The first candidate whose predicate
//! holds names the provider; only that provider is looked up. Precedence is
//! therefore the declaration order: explicit option, then version-gated
//! default, then the legacy system path.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ResolveError;
use crate::notice::{Notice, NoticeSink};
use crate::options::OptionSet;
use crate::platform::PlatformContext;
use crate::predicate::Predicate;

/// Finds where a provider is installed.
pub trait DependencyLookup {
    /// Installed prefix of `provider`, or `None` if it is not installed.
    fn lookup(&self, provider: &str) -> Option<PathBuf>;

    /// Whether a path under a provider prefix exists.
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Looks providers up as `<root>/opt/<provider>`, with explicit overrides.
#[derive(Debug, Clone)]
pub struct OptLookup {
    opt_root: PathBuf,
    overrides: BTreeMap<String, PathBuf>,
}

impl OptLookup {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            opt_root: root.as_ref().join("opt"),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, PathBuf>) -> Self {
        self.overrides = overrides;
        self
    }
}

impl DependencyLookup for OptLookup {
    fn lookup(&self, provider: &str) -> Option<PathBuf> {
        if let Some(path) = self.overrides.get(provider) {
            return Some(path.clone());
        }
        let path = self.opt_root.join(provider);
        path.is_dir().then_some(path)
    }
}

/// In-memory lookup for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    providers: BTreeMap<String, PathBuf>,
    files: BTreeSet<PathBuf>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider as installed under `<root>/opt/<name>`.
    pub fn installed_under(root: impl AsRef<Path>, providers: &[&str]) -> Self {
        let opt = root.as_ref().join("opt");
        let mut lookup = Self::new();
        for name in providers {
            lookup = lookup.with(*name, opt.join(name));
        }
        lookup
    }

    pub fn with(mut self, provider: impl Into<String>, prefix: impl Into<PathBuf>) -> Self {
        self.providers.insert(provider.into(), prefix.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(path.into());
        self
    }
}

impl DependencyLookup for StaticLookup {
    fn lookup(&self, provider: &str) -> Option<PathBuf> {
        self.providers.get(provider).cloned()
    }

    fn exists(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

/// Where a candidate's dependency comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// A package found through [`DependencyLookup`]
    Package(String),
    /// A fixed path supplied by the operating system; never looked up
    System(PathBuf),
}

impl Provider {
    pub fn name(&self) -> String {
        match self {
            Provider::Package(name) => name.clone(),
            Provider::System(path) => format!("system:{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub predicate: Predicate,
    pub provider: Provider,
    /// Template variables set when this candidate is chosen
    pub exports: Vec<(String, String)>,
}

impl Candidate {
    pub fn new(predicate: Predicate, provider: Provider) -> Self {
        Self {
            predicate,
            provider,
            exports: Vec::new(),
        }
    }

    pub fn package(predicate: Predicate, name: impl Into<String>) -> Self {
        Self::new(predicate, Provider::Package(name.into()))
    }

    pub fn system(path: impl Into<PathBuf>) -> Self {
        Self::new(Predicate::Always, Provider::System(path.into()))
    }

    pub fn export(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.exports.push((var.into(), value.into()));
        self
    }
}

/// How a slot behaves when it cannot be filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Necessity {
    /// No matching candidate or failed lookup is an error
    Required,
    /// No matching candidate leaves the slot absent; failed lookup is an error
    WhenSelected,
    /// Any failure leaves the slot absent
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencySlot {
    pub name: String,
    pub necessity: Necessity,
    pub candidates: Vec<Candidate>,
    /// Relative paths tried in order under a package prefix
    pub probe: Vec<String>,
}

impl DependencySlot {
    pub fn new(name: impl Into<String>, necessity: Necessity) -> Self {
        Self {
            name: name.into(),
            necessity,
            candidates: Vec::new(),
            probe: Vec::new(),
        }
    }

    /// A required slot with a single unconditional package provider.
    pub fn required(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::new(name, Necessity::Required)
            .candidate(Candidate::package(Predicate::Always, provider))
    }

    pub fn candidate(mut self, candidate: Candidate) -> Self {
        self.candidates.push(candidate);
        self
    }

    pub fn probe(mut self, paths: &[&str]) -> Self {
        self.probe = paths.iter().map(|p| p.to_string()).collect();
        self
    }

    /// First candidate whose predicate holds.
    pub fn choose(&self, options: &OptionSet, platform: &PlatformContext) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|c| c.predicate.evaluate(options, platform))
    }
}

/// A slot filled with a concrete, installed provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
    pub slot: String,
    pub provider: String,
    pub prefix_path: PathBuf,
}

/// A host condition that must hold for the build to work at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Requirement {
    pub name: String,
    pub applies: Predicate,
    pub satisfied: Predicate,
    pub message: String,
}

/// An informational warning tied to a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub when: Predicate,
    pub message: String,
}

/// Result of running the selector over all slots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Present dependencies in slot declaration order
    pub dependencies: Vec<ResolvedDependency>,
    /// Variables exported by chosen candidates (unexpanded templates)
    pub exports: BTreeMap<String, String>,
}

impl Selection {
    pub fn get(&self, slot: &str) -> Option<&ResolvedDependency> {
        self.dependencies.iter().find(|d| d.slot == slot)
    }
}

/// Fail on the first requirement that applies but is not satisfied.
pub fn check_requirements(
    requirements: &[Requirement],
    options: &OptionSet,
    platform: &PlatformContext,
) -> Result<(), ResolveError> {
    for req in requirements {
        if req.applies.evaluate(options, platform) && !req.satisfied.evaluate(options, platform) {
            return Err(ResolveError::RequirementNotMet {
                name: req.name.clone(),
                message: req.message.clone(),
            });
        }
    }
    Ok(())
}

/// Resolve every slot to a provider.
pub fn select(
    slots: &[DependencySlot],
    options: &OptionSet,
    platform: &PlatformContext,
    lookup: &dyn DependencyLookup,
    notices: &mut dyn NoticeSink,
) -> Result<Selection, ResolveError> {
    let mut selection = Selection::default();

    for slot in slots {
        let Some(candidate) = slot.choose(options, platform) else {
            if slot.necessity == Necessity::Required {
                return Err(ResolveError::DependencyNotFound {
                    slot: slot.name.clone(),
                    provider: "no matching provider".to_string(),
                });
            }
            tracing::debug!(slot = %slot.name, "no candidate selected, slot absent");
            continue;
        };

        match locate(slot, &candidate.provider, lookup) {
            Some(prefix_path) => {
                tracing::debug!(
                    slot = %slot.name,
                    provider = %candidate.provider.name(),
                    path = %prefix_path.display(),
                    "selected provider"
                );
                for (var, value) in &candidate.exports {
                    selection.exports.insert(var.clone(), value.clone());
                }
                selection.dependencies.push(ResolvedDependency {
                    slot: slot.name.clone(),
                    provider: candidate.provider.name(),
                    prefix_path,
                });
            }
            None if slot.necessity == Necessity::Optional => {
                tracing::warn!(
                    slot = %slot.name,
                    provider = %candidate.provider.name(),
                    "optional provider not installed"
                );
                notices.notice(Notice::Advisory(format!(
                    "{} not installed, building without it",
                    candidate.provider.name()
                )));
            }
            None => {
                return Err(ResolveError::DependencyNotFound {
                    slot: slot.name.clone(),
                    provider: candidate.provider.name(),
                });
            }
        }
    }

    Ok(selection)
}

fn locate(
    slot: &DependencySlot,
    provider: &Provider,
    lookup: &dyn DependencyLookup,
) -> Option<PathBuf> {
    match provider {
        Provider::System(path) => Some(path.clone()),
        Provider::Package(name) => {
            let prefix = lookup.lookup(name)?;
            if slot.probe.is_empty() {
                return Some(prefix);
            }
            slot.probe
                .iter()
                .map(|rel| prefix.join(rel))
                .find(|path| lookup.exists(path))
        }
    }
}
