//! Literal search-and-replace patches against build files.
//!
//! Recipes may be re-run against a partially built tree, so a patch set must
//! be safe to apply twice. [`PatchSet::new`] rejects rule sequences where a
//! replacement would feed a later pass (its text contains the search string
//! of itself or an earlier rule on the same file); everything else is
//! idempotent by construction.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::util::{expand_vars, Vars};

#[derive(Error, Debug)]
pub enum PatchError {
    #[error("patch for {file} has an empty search string")]
    EmptySearch { file: String },

    #[error("patch for {file} is not idempotent: replacement reintroduces {search:?}")]
    NotIdempotent { file: String, search: String },

    #[error("mandatory patch target missing: {0}")]
    MissingTarget(PathBuf),

    #[error("mandatory patch not applicable to {file}: {search:?} not found")]
    NotFound { file: PathBuf, search: String },

    #[error("IO error patching {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchPhase {
    /// Against the unpacked source tree, before configure
    BeforeConfigure,
    /// Against files produced by the build, before they are installed
    AfterBuild,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchRule {
    /// Path relative to the source directory
    pub target_file: String,
    pub search: String,
    pub replace: String,
    pub phase: PatchPhase,
    pub mandatory: bool,
}

impl PatchRule {
    pub fn new(
        target_file: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
        phase: PatchPhase,
    ) -> Self {
        Self {
            target_file: target_file.into(),
            search: search.into(),
            replace: replace.into(),
            phase,
            mandatory: false,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Substitute `{{var}}` references in all text fields.
    pub fn expand(&self, vars: &Vars) -> Self {
        Self {
            target_file: expand_vars(vars, &self.target_file),
            search: expand_vars(vars, &self.search),
            replace: expand_vars(vars, &self.replace),
            ..self.clone()
        }
    }
}

/// Outcome of applying a set of rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchReport {
    /// Files whose content changed
    pub changed: Vec<PathBuf>,
    /// Rules that found nothing to replace (already applied or optional)
    pub skipped: usize,
}

/// An ordered, validated rule sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchSet {
    rules: Vec<PatchRule>,
}

impl PatchSet {
    pub fn new(rules: Vec<PatchRule>) -> Result<Self, PatchError> {
        for (j, later) in rules.iter().enumerate() {
            if later.search.is_empty() {
                return Err(PatchError::EmptySearch {
                    file: later.target_file.clone(),
                });
            }
            for (i, earlier) in rules[..=j].iter().enumerate() {
                // a rule that rewrites text to itself changes nothing
                if i == j && later.replace == later.search {
                    continue;
                }
                if earlier.target_file == later.target_file
                    && later.replace.contains(&earlier.search)
                {
                    return Err(PatchError::NotIdempotent {
                        file: later.target_file.clone(),
                        search: earlier.search.clone(),
                    });
                }
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules of one phase, keeping their order.
    pub fn phase(&self, phase: PatchPhase) -> PatchSet {
        PatchSet {
            rules: self.rules.iter().filter(|r| r.phase == phase).cloned().collect(),
        }
    }

    /// Apply the rules for `file` to in-memory content.
    pub fn apply_str(&self, file: &str, content: &str) -> Result<(String, usize), PatchError> {
        let mut text = content.to_string();
        let mut skipped = 0;
        for rule in self.rules.iter().filter(|r| r.target_file == file) {
            if text.contains(&rule.search) {
                text = text.replace(&rule.search, &rule.replace);
                continue;
            }
            if rule.mandatory && !text.contains(&rule.replace) {
                return Err(PatchError::NotFound {
                    file: PathBuf::from(file),
                    search: rule.search.clone(),
                });
            }
            skipped += 1;
        }
        Ok((text, skipped))
    }

    /// Apply every rule to files under `dir`, rewriting files in place.
    pub fn apply(&self, dir: &Path) -> Result<PatchReport, PatchError> {
        let mut by_file: BTreeMap<&str, Vec<&PatchRule>> = BTreeMap::new();
        let mut order = Vec::new();
        for rule in &self.rules {
            by_file
                .entry(rule.target_file.as_str())
                .or_insert_with(|| {
                    order.push(rule.target_file.as_str());
                    Vec::new()
                })
                .push(rule);
        }

        let mut report = PatchReport::default();
        for file in order {
            let path = dir.join(file);
            if !path.is_file() {
                let rules = by_file.get(file).map(Vec::as_slice).unwrap_or_default();
                if rules.iter().any(|r| r.mandatory) {
                    return Err(PatchError::MissingTarget(path));
                }
                tracing::debug!(file = %path.display(), "patch target absent, skipping");
                report.skipped += rules.len();
                continue;
            }

            let original = fs::read_to_string(&path).map_err(|source| PatchError::Io {
                path: path.clone(),
                source,
            })?;
            let (patched, skipped) = self.apply_str(file, &original)?;
            report.skipped += skipped;

            if patched != original {
                fs::write(&path, patched).map_err(|source| PatchError::Io {
                    path: path.clone(),
                    source,
                })?;
                tracing::info!(file = %path.display(), "patched");
                report.changed.push(path);
            }
        }
        Ok(report)
    }
}
