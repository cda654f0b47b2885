//! Install lifecycle for a resolved configuration.
//!
//! Order: before-configure patches, layout file, configuration directories,
//! build, after-build patches, install, state directories and log files,
//! service descriptor, caveats. The first failure stops the sequence; work
//! already done stays in place.

use std::fs;
use std::path::{Path, PathBuf};

use crate::build::BuildStep;
use crate::error::ResolveError;
use crate::layout;
use crate::notice::{Notice, NoticeSink};
use crate::output;
use crate::patch::PatchPhase;
use crate::resolver::ResolvedBuildConfiguration;

/// What an install run touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub patched: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    pub log_files: Vec<PathBuf>,
    pub plist: Option<PathBuf>,
}

pub fn install(
    resolved: &ResolvedBuildConfiguration,
    source_dir: &Path,
    step: &mut dyn BuildStep,
    notices: &mut dyn NoticeSink,
) -> Result<InstallReport, ResolveError> {
    let name = &resolved.package.name;
    output::action(&format!("Installing {} {}", name, resolved.package.version));
    let mut report = InstallReport::default();

    output::sub_action("patch");
    let before = resolved.patches.phase(PatchPhase::BeforeConfigure);
    report.patched.extend(before.apply(source_dir)?.changed);

    if let Some(file) = &resolved.layout_file {
        let path = source_dir.join(&file.name);
        fs::write(&path, &file.contents)?;
        output::detail(&format!("wrote {}", path.display()));
    }
    report
        .directories
        .extend(layout::prepare_directories(&resolved.layout, &resolved.config_dirs)?);

    output::sub_action("build");
    step.run(source_dir, &resolved.build)?;

    let after = resolved.patches.phase(PatchPhase::AfterBuild);
    if !after.is_empty() {
        output::sub_action("patch");
        report.patched.extend(after.apply(source_dir)?.changed);
    }

    output::sub_action("install");
    step.run(source_dir, &resolved.install)?;

    report
        .directories
        .extend(layout::prepare_directories(&resolved.layout, &resolved.state_dirs)?);
    report
        .log_files
        .extend(layout::touch_log_files(&resolved.layout, &resolved.log_files)?);

    if let Some(service) = &resolved.service {
        let path = service.write_to(&resolved.keg())?;
        output::detail(&format!("wrote {}", path.display()));
        report.plist = Some(path);
    }

    for caveat in &resolved.caveats {
        notices.notice(Notice::Caveat(caveat.clone()));
    }

    tracing::info!(
        package = %name,
        patched = report.patched.len(),
        directories = report.directories.len(),
        "install finished"
    );
    output::success(&format!("{} installed", name));
    Ok(report)
}
