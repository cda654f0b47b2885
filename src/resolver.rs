//! The resolution pipeline.
//!
//! ```text
//! raw flags -> options -> conflicts -> requirements -> dependencies
//!           -> layout -> configure args, patches, service, caveats
//! ```
//!
//! Every stage before the build step is pure apart from dependency lookup.
//! Validation errors stop the pipeline before any lookup runs.

use std::path::PathBuf;

use serde::Serialize;

use crate::build::{self, Invocation};
use crate::conflicts;
use crate::deps::{self, DependencyLookup, ResolvedDependency};
use crate::error::ResolveError;
use crate::layout::{self, PackageId, PathLayout};
use crate::notice::{Notice, NoticeSink};
use crate::options::{OptionSet, RequestedOptions};
use crate::patch::PatchSet;
use crate::platform::PlatformContext;
use crate::recipe::Recipe;
use crate::service::{self, ServiceDescriptor};
use crate::util::expand_vars;

/// Host-side inputs for a resolution.
pub struct Host<'a> {
    pub platform: PlatformContext,
    pub lookup: &'a dyn DependencyLookup,
    /// Absolute install root
    pub root: PathBuf,
    /// Parallel jobs for the build
    pub jobs: usize,
}

/// A file generated into the source tree before configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub name: String,
    pub contents: String,
}

/// Complete, validated input to the external build step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBuildConfiguration {
    pub package: PackageId,
    pub platform: PlatformContext,
    pub options: OptionSet,
    pub dependencies: Vec<ResolvedDependency>,
    pub configure_args: Vec<String>,
    pub layout: PathLayout,
    pub layout_file: Option<GeneratedFile>,
    /// Roles created before configure
    pub config_dirs: Vec<String>,
    /// Roles created after install
    pub state_dirs: Vec<String>,
    pub log_files: Vec<(String, String)>,
    pub patches: PatchSet,
    pub build: Vec<Invocation>,
    pub install: Vec<Invocation>,
    pub service: Option<ServiceDescriptor>,
    pub caveats: Vec<String>,
}

impl ResolvedBuildConfiguration {
    /// Versioned install prefix.
    pub fn keg(&self) -> PathBuf {
        self.package.keg(&self.layout.root)
    }
}

/// Resolve a recipe against a user request and host snapshot.
pub fn resolve(
    recipe: &Recipe,
    request: &RequestedOptions,
    host: &Host<'_>,
    notices: &mut dyn NoticeSink,
) -> Result<ResolvedBuildConfiguration, ResolveError> {
    let platform = &host.platform;

    let registry = recipe.registry()?;
    let options = registry.resolve(request, notices)?;
    conflicts::validate(&recipe.conflicts, &options)?;
    deps::check_requirements(&recipe.requirements, &options, platform)?;

    for advisory in &recipe.advisories {
        if advisory.when.evaluate(&options, platform) {
            tracing::warn!(recipe = %recipe.name, "{}", advisory.message);
            notices.notice(Notice::Advisory(advisory.message.clone()));
        }
    }

    let selection = deps::select(&recipe.slots, &options, platform, host.lookup, notices)?;

    let package = recipe.package_id();
    let layout = layout::generate(&recipe.layout, &host.root, &package)?;
    let layout_file = recipe.layout.file_name.as_ref().map(|name| GeneratedFile {
        name: name.clone(),
        contents: layout::render_layout_file(&recipe.layout, &layout),
    });

    let mut vars = layout.vars();
    vars.insert("name".to_string(), package.name.clone());
    vars.insert("version".to_string(), package.version.clone());
    vars.insert("os_version".to_string(), platform.os_version.release().to_string());
    for (var, template) in &selection.exports {
        let value = expand_vars(&vars, template);
        vars.insert(var.clone(), value);
    }

    let configure_args = recipe.configure.compile(&options, &selection, platform, &vars);

    let patches = PatchSet::new(recipe.patches.iter().map(|p| p.expand(&vars)).collect())?;

    let service = recipe
        .service
        .as_ref()
        .map(|spec| service::generate(&package.name, spec, &options, &vars));

    let mut caveats = Vec::new();
    if let Some(desc) = &service {
        let plist_path = package.keg(&layout.root).join(desc.file_name());
        vars.insert("plist_name".to_string(), desc.file_name());
        vars.insert("plist_path".to_string(), plist_path.display().to_string());
    }
    for caveat in &recipe.caveats {
        if caveat.when.evaluate(&options, platform) {
            caveats.push(expand_vars(&vars, &caveat.text));
        }
    }
    if let (Some(desc), Some(spec)) = (&service, &recipe.service) {
        if !desc.auto_start {
            caveats.push(format!(
                "If you don't want/need a background service you can just run:\n  {}",
                spec.manual_command
            ));
        }
    }

    let build = build::plan(&recipe.build, &configure_args, &layout, &vars, host.jobs);
    let install = build::plan(&recipe.install, &configure_args, &layout, &vars, host.jobs);

    tracing::info!(
        recipe = %recipe.name,
        options = ?options,
        dependencies = selection.dependencies.len(),
        "resolved build configuration"
    );

    Ok(ResolvedBuildConfiguration {
        package,
        platform: *platform,
        options,
        dependencies: selection.dependencies,
        configure_args,
        layout,
        layout_file,
        config_dirs: recipe.layout.config_dirs.clone(),
        state_dirs: recipe.layout.state_dirs.clone(),
        log_files: recipe.layout.log_files.clone(),
        patches,
        build,
        install,
        service,
        caveats,
    })
}
