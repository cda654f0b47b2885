//! Recipe definitions.
//!
//! A [`Recipe`] is immutable data: everything a resolver needs to turn user
//! options and a platform snapshot into a build configuration. The shipped
//! recipes live in [`crate::recipes`].

use serde::Serialize;

use crate::build::BuildCommand;
use crate::conflicts::ConflictRule;
use crate::configure::ConfigureTemplate;
use crate::deps::{Advisory, DependencySlot, Requirement};
use crate::layout::{LayoutSpec, PackageId};
use crate::options::{BuildOption, OptionRegistry, RegistryError};
use crate::patch::PatchRule;
use crate::predicate::Predicate;
use crate::service::ServiceSpec;

/// Post-install text shown when its predicate holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caveat {
    pub when: Predicate,
    /// Template over layout roles and exported variables
    pub text: String,
}

impl Caveat {
    pub fn always(text: impl Into<String>) -> Self {
        Self {
            when: Predicate::Always,
            text: text.into(),
        }
    }

    pub fn when(when: Predicate, text: impl Into<String>) -> Self {
        Self {
            when,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recipe {
    pub name: String,
    pub version: String,
    /// Version segment used in shared paths (`etc/apache2/<qualifier>`)
    pub qualifier: String,
    pub description: String,
    pub homepage: String,
    pub options: Vec<BuildOption>,
    pub conflicts: Vec<ConflictRule>,
    /// Packages that cannot be linked alongside this one
    pub conflicts_with: Vec<String>,
    pub slots: Vec<DependencySlot>,
    pub requirements: Vec<Requirement>,
    pub advisories: Vec<Advisory>,
    pub configure: ConfigureTemplate,
    pub layout: LayoutSpec,
    pub patches: Vec<PatchRule>,
    /// Commands up to and including compilation
    pub build: Vec<BuildCommand>,
    /// Commands run after the after-build patches
    pub install: Vec<BuildCommand>,
    pub service: Option<ServiceSpec>,
    pub caveats: Vec<Caveat>,
}

impl Recipe {
    pub fn new(name: &str, version: &str, qualifier: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            qualifier: qualifier.to_string(),
            description: String::new(),
            homepage: String::new(),
            options: Vec::new(),
            conflicts: Vec::new(),
            conflicts_with: Vec::new(),
            slots: Vec::new(),
            requirements: Vec::new(),
            advisories: Vec::new(),
            configure: ConfigureTemplate::default(),
            layout: LayoutSpec::default(),
            patches: Vec::new(),
            build: Vec::new(),
            install: Vec::new(),
            service: None,
            caveats: Vec::new(),
        }
    }

    pub fn registry(&self) -> Result<OptionRegistry, RegistryError> {
        OptionRegistry::new(self.options.clone())
    }

    pub fn package_id(&self) -> PackageId {
        PackageId {
            name: self.name.clone(),
            version: self.version.clone(),
            qualifier: self.qualifier.clone(),
        }
    }
}
