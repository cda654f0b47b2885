//! Conflict rules over the normalized option set.

use serde::Serialize;

use crate::error::ResolveError;
use crate::options::OptionSet;

/// Options that may not all be active at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRule {
    pub options: Vec<String>,
    pub explanation: String,
}

impl ConflictRule {
    pub fn new<S: Into<String>>(
        options: impl IntoIterator<Item = S>,
        explanation: impl Into<String>,
    ) -> Self {
        Self {
            options: options.into_iter().map(Into::into).collect(),
            explanation: explanation.into(),
        }
    }

    /// True if every option named by the rule is active.
    pub fn fires(&self, options: &OptionSet) -> bool {
        !self.options.is_empty() && self.options.iter().all(|o| options.contains(o))
    }
}

/// Mutually exclusive variants of one underlying product.
///
/// Defined once and shared: the variant packages list each other as
/// conflicts, and an add-on that binds to one variant turns the group into
/// option-level conflict rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantGroup {
    pub product: String,
    /// `(package, binding option)` pairs
    pub variants: Vec<(String, String)>,
    pub explanation: String,
}

impl VariantGroup {
    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|(pkg, _)| pkg.as_str())
    }

    /// Every other package in the group.
    pub fn conflicts_of(&self, package: &str) -> Vec<String> {
        self.packages()
            .filter(|p| *p != package)
            .map(str::to_string)
            .collect()
    }

    /// Pairwise rules over the binding options.
    pub fn binding_rules(&self) -> Vec<ConflictRule> {
        let mut rules = Vec::new();
        for (i, (pkg_a, opt_a)) in self.variants.iter().enumerate() {
            for (pkg_b, opt_b) in &self.variants[i + 1..] {
                rules.push(ConflictRule::new(
                    [opt_a.as_str(), opt_b.as_str()],
                    format!(
                        "cannot build for {} and {} at the same time: {}",
                        pkg_a, pkg_b, self.explanation
                    ),
                ));
            }
        }
        rules
    }
}

/// Check every rule; the first one that fires is the error.
pub fn validate(rules: &[ConflictRule], options: &OptionSet) -> Result<(), ResolveError> {
    if let Some(rule) = rules.iter().find(|r| r.fires(options)) {
        tracing::debug!(options = ?rule.options, "conflict rule fired");
        return Err(ResolveError::Conflict {
            options: rule.options.clone(),
            explanation: rule.explanation.clone(),
        });
    }
    Ok(())
}
