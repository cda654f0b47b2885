//! Build options and deprecated-name aliases.
//!
//! A recipe declares its options once:
//!
//! ```text
//! option "with-mpm-worker", "Use the Worker Multi-Processing Module"
//! deprecated_option "with-http2" => "with-nghttp2"
//! ```
//!
//! Users pass raw flags (`with-mpm-worker`, `mpm-worker`, `without-nghttp2`).
//! Resolution is two-stage: aliases map to canonical names (at most one hop,
//! checked when the registry is built), then defaults are merged with the
//! user's additions and removals.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;

use crate::error::ResolveError;
use crate::notice::{Notice, NoticeSink};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("duplicate option: {0}")]
    DuplicateOption(String),
    #[error("alias {alias} points to another alias ({target})")]
    AliasChain { alias: String, target: String },
    #[error("alias {alias} points to unknown option {target}")]
    DanglingAlias { alias: String, target: String },
}

/// A single option definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildOption {
    /// Option name without `with-` (e.g. "mpm-worker")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Enabled unless the user passes `without-<name>`
    pub default: bool,
    /// Canonical option this deprecated name stands for
    pub deprecated_alias_of: Option<String>,
}

impl BuildOption {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default: false,
            deprecated_alias_of: None,
        }
    }

    pub fn alias(name: impl Into<String>, canonical: impl Into<String>) -> Self {
        let canonical = canonical.into();
        Self {
            name: name.into(),
            description: format!("Deprecated alias for {}", canonical),
            default: false,
            deprecated_alias_of: Some(canonical),
        }
    }

    pub fn enabled_by_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn is_alias(&self) -> bool {
        self.deprecated_alias_of.is_some()
    }
}

/// The normalized set of active option names.
pub type OptionSet = BTreeSet<String>;

/// Raw user request: options to turn on and default options to turn off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestedOptions {
    pub enable: Vec<String>,
    pub disable: Vec<String>,
}

impl RequestedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.enable.push(name.into());
        self
    }

    pub fn without(mut self, name: impl Into<String>) -> Self {
        self.disable.push(name.into());
        self
    }

    /// Parse raw flags such as `--with-ldap`, `with-ldap`, `ldap` or
    /// `--without-nghttp2`.
    pub fn parse_flags<S: AsRef<str>>(flags: &[S]) -> Self {
        let mut request = Self::new();
        for flag in flags {
            let flag = flag.as_ref().trim_start_matches('-');
            if let Some(name) = flag.strip_prefix("without-") {
                request.disable.push(name.to_string());
            } else if let Some(name) = flag.strip_prefix("with-") {
                request.enable.push(name.to_string());
            } else {
                request.enable.push(flag.to_string());
            }
        }
        request
    }
}

/// Catalog of recognized options for one recipe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionRegistry {
    options: BTreeMap<String, BuildOption>,
    order: Vec<String>,
}

impl OptionRegistry {
    /// Build a registry, rejecting duplicates and alias chains.
    pub fn new(options: Vec<BuildOption>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for option in options {
            if registry.options.contains_key(&option.name) {
                return Err(RegistryError::DuplicateOption(option.name));
            }
            registry.order.push(option.name.clone());
            registry.options.insert(option.name.clone(), option);
        }

        for option in registry.options.values() {
            let Some(target) = &option.deprecated_alias_of else {
                continue;
            };
            match registry.options.get(target) {
                None => {
                    return Err(RegistryError::DanglingAlias {
                        alias: option.name.clone(),
                        target: target.clone(),
                    });
                }
                Some(t) if t.is_alias() => {
                    return Err(RegistryError::AliasChain {
                        alias: option.name.clone(),
                        target: target.clone(),
                    });
                }
                Some(_) => {}
            }
        }

        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&BuildOption> {
        self.options.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    /// Options in declaration order, aliases included.
    pub fn iter(&self) -> impl Iterator<Item = &BuildOption> {
        self.order.iter().filter_map(|name| self.options.get(name))
    }

    /// Map a requested name onto its canonical option.
    ///
    /// Returns the canonical name and, if the request used an alias, the
    /// alias that was replaced.
    pub fn canonicalize<'a>(
        &'a self,
        name: &'a str,
    ) -> Result<(&'a str, Option<&'a str>), ResolveError> {
        let option = self
            .options
            .get(name)
            .ok_or_else(|| ResolveError::UnknownOption(name.to_string()))?;
        match &option.deprecated_alias_of {
            Some(target) => Ok((target.as_str(), Some(option.name.as_str()))),
            None => Ok((option.name.as_str(), None)),
        }
    }

    /// Resolve a user request into a normalized option set.
    ///
    /// Starts from the default-on options, adds the requested ones, then
    /// removes the disabled ones. Deprecated names produce a notice.
    pub fn resolve(
        &self,
        request: &RequestedOptions,
        notices: &mut dyn NoticeSink,
    ) -> Result<OptionSet, ResolveError> {
        let mut enabled: OptionSet = self
            .options
            .values()
            .filter(|o| o.default && !o.is_alias())
            .map(|o| o.name.clone())
            .collect();

        for name in &request.enable {
            let canonical = self.canonical_with_notice(name, notices)?;
            enabled.insert(canonical);
        }

        for name in &request.disable {
            let canonical = self.canonical_with_notice(name, notices)?;
            enabled.remove(&canonical);
        }

        tracing::debug!(options = ?enabled, "resolved options");
        Ok(enabled)
    }

    fn canonical_with_notice(
        &self,
        name: &str,
        notices: &mut dyn NoticeSink,
    ) -> Result<String, ResolveError> {
        let (canonical, alias) = self.canonicalize(name)?;
        if let Some(alias) = alias {
            notices.notice(Notice::Deprecated {
                alias: alias.to_string(),
                canonical: canonical.to_string(),
            });
        }
        Ok(canonical.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> OptionRegistry {
        OptionRegistry::new(vec![
            BuildOption::new("mpm-worker", "Worker MPM"),
            BuildOption::new("ldap", "LDAP support"),
            BuildOption::new("nghttp2", "HTTP/2 support").enabled_by_default(),
            BuildOption::alias("http2", "nghttp2"),
        ])
        .unwrap()
    }

    #[test]
    fn test_defaults_are_enabled() {
        let mut notices: Vec<Notice> = Vec::new();
        let set = registry()
            .resolve(&RequestedOptions::new(), &mut notices)
            .unwrap();
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["nghttp2"]);
        assert!(notices.is_empty());
    }

    #[test]
    fn test_additions_and_removals() {
        let mut notices: Vec<Notice> = Vec::new();
        let request = RequestedOptions::new().with("ldap").without("nghttp2");
        let set = registry().resolve(&request, &mut notices).unwrap();
        assert!(set.contains("ldap"));
        assert!(!set.contains("nghttp2"));
    }

    #[test]
    fn test_alias_is_substituted_with_notice() {
        let mut notices: Vec<Notice> = Vec::new();
        let request = RequestedOptions::new().without("nghttp2").with("http2");
        let set = registry().resolve(&request, &mut notices).unwrap();
        // removal runs after additions, so the alias addition is undone
        assert!(!set.contains("nghttp2"));
        assert!(!set.contains("http2"));
        assert_eq!(
            notices,
            vec![Notice::Deprecated {
                alias: "http2".to_string(),
                canonical: "nghttp2".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_option() {
        let mut notices: Vec<Notice> = Vec::new();
        let request = RequestedOptions::new().with("mpm-fancy");
        let err = registry().resolve(&request, &mut notices).unwrap_err();
        assert!(matches!(err, ResolveError::UnknownOption(name) if name == "mpm-fancy"));
    }

    #[test]
    fn test_unknown_removal_is_rejected() {
        let mut notices: Vec<Notice> = Vec::new();
        let request = RequestedOptions::new().without("ssl");
        assert!(registry().resolve(&request, &mut notices).is_err());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let reg = registry();
        let mut notices: Vec<Notice> = Vec::new();
        let request = RequestedOptions::new().with("http2").with("ldap");
        let first = reg.resolve(&request, &mut notices).unwrap();

        let mut again: Vec<Notice> = Vec::new();
        let replay = RequestedOptions {
            enable: first.iter().cloned().collect(),
            disable: Vec::new(),
        };
        let second = reg.resolve(&replay, &mut again).unwrap();
        assert_eq!(first, second);
        assert!(again.is_empty());
    }

    #[test]
    fn test_alias_chain_rejected() {
        let result = OptionRegistry::new(vec![
            BuildOption::new("nghttp2", ""),
            BuildOption::alias("http2", "nghttp2"),
            BuildOption::alias("spdy", "http2"),
        ]);
        assert!(matches!(result, Err(RegistryError::AliasChain { .. })));
    }

    #[test]
    fn test_dangling_alias_and_duplicates_rejected() {
        let dangling = OptionRegistry::new(vec![BuildOption::alias("http2", "nghttp2")]);
        assert!(matches!(dangling, Err(RegistryError::DanglingAlias { .. })));

        let dup = OptionRegistry::new(vec![
            BuildOption::new("ldap", ""),
            BuildOption::new("ldap", ""),
        ]);
        assert_eq!(dup, Err(RegistryError::DuplicateOption("ldap".to_string())));
    }

    #[test]
    fn test_parse_flags() {
        let request =
            RequestedOptions::parse_flags(&["--with-ldap", "mpm-worker", "without-nghttp2"]);
        assert_eq!(request.enable, vec!["ldap", "mpm-worker"]);
        assert_eq!(request.disable, vec!["nghttp2"]);
    }
}
