//! The external build step.
//!
//! Recipes describe their build as a short command list; the resolver turns
//! it into concrete invocations and hands them to a [`BuildStep`]. The
//! process-backed implementation runs each command in the source directory
//! and stops at the first non-zero exit status. Nothing is rolled back.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;

use crate::error::ResolveError;
use crate::layout::PathLayout;
use crate::output;
use crate::util::{command_line, expand_vars, Vars};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildCommand {
    /// Arbitrary program; arguments may use `{{role}}` templates
    Run { program: String, args: Vec<String> },
    /// `./configure` with the compiled argument list
    Configure,
    /// `make`, parallel unless a target is given
    Make { target: Option<String> },
    /// Copy a build product into a layout role
    Install { from: String, to_role: String },
}

impl BuildCommand {
    pub fn run(program: &str, args: &[&str]) -> Self {
        BuildCommand::Run {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn make() -> Self {
        BuildCommand::Make { target: None }
    }

    pub fn make_target(target: &str) -> Self {
        BuildCommand::Make {
            target: Some(target.to_string()),
        }
    }

    pub fn install(from: &str, to_role: &str) -> Self {
        BuildCommand::Install {
            from: from.to_string(),
            to_role: to_role.to_string(),
        }
    }
}

/// A concrete step handed to the build tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Invocation {
    Exec { program: String, args: Vec<String> },
    /// `from` is relative to the source directory
    Install { from: PathBuf, to: PathBuf },
}

impl Invocation {
    pub fn display(&self) -> String {
        match self {
            Invocation::Exec { program, args } => command_line(program, args),
            Invocation::Install { from, to } => {
                format!("install {} {}", from.display(), to.display())
            }
        }
    }
}

/// Turn recipe commands into invocations.
pub fn plan(
    commands: &[BuildCommand],
    configure_args: &[String],
    layout: &PathLayout,
    vars: &Vars,
    jobs: usize,
) -> Vec<Invocation> {
    commands
        .iter()
        .map(|cmd| match cmd {
            BuildCommand::Run { program, args } => Invocation::Exec {
                program: expand_vars(vars, program),
                args: args.iter().map(|a| expand_vars(vars, a)).collect(),
            },
            BuildCommand::Configure => Invocation::Exec {
                program: "./configure".to_string(),
                args: configure_args.to_vec(),
            },
            BuildCommand::Make { target: None } => Invocation::Exec {
                program: "make".to_string(),
                args: vec![format!("-j{}", jobs.max(1))],
            },
            BuildCommand::Make { target: Some(t) } => Invocation::Exec {
                program: "make".to_string(),
                args: vec![t.clone()],
            },
            BuildCommand::Install { from, to_role } => {
                let from = PathBuf::from(expand_vars(vars, from));
                let dir = layout
                    .get(to_role)
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| layout.root.join(to_role));
                let to = match from.file_name() {
                    Some(name) => dir.join(name),
                    None => dir,
                };
                Invocation::Install { from, to }
            }
        })
        .collect()
}

/// Runs the external build and reports its exit status.
pub trait BuildStep {
    fn run(&mut self, source_dir: &Path, invocations: &[Invocation]) -> Result<(), ResolveError>;
}

/// Runs invocations as child processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessBuildStep {
    /// Print invocations without running them
    pub dry_run: bool,
}

impl ProcessBuildStep {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl BuildStep for ProcessBuildStep {
    fn run(&mut self, source_dir: &Path, invocations: &[Invocation]) -> Result<(), ResolveError> {
        for inv in invocations {
            let line = inv.display();
            if self.dry_run {
                output::detail(&format!("[dry-run] {}", line));
                continue;
            }
            tracing::info!(command = %line, "running build step");

            match inv {
                Invocation::Exec { program, args } => {
                    let pb = output::build_spinner(&line);
                    // scripts shipped in the tree run from the tree
                    let program = match program.strip_prefix("./") {
                        Some(script) => source_dir.join(script),
                        None => PathBuf::from(program),
                    };
                    let out = Command::new(&program)
                        .args(args)
                        .current_dir(source_dir)
                        .output();
                    let out = match out {
                        Ok(out) => out,
                        Err(e) => {
                            output::progress_fail(pb, &line);
                            return Err(ResolveError::BuildStepFailed {
                                command: line,
                                code: None,
                                stderr: e.to_string(),
                            });
                        }
                    };
                    if !out.status.success() {
                        output::progress_fail(pb, &line);
                        return Err(ResolveError::BuildStepFailed {
                            command: line,
                            code: out.status.code(),
                            stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                        });
                    }
                    output::progress_done(pb);
                }
                Invocation::Install { from, to } => {
                    if let Some(parent) = to.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::copy(source_dir.join(from), to).map_err(|e| {
                        ResolveError::BuildStepFailed {
                            command: line.clone(),
                            code: None,
                            stderr: e.to_string(),
                        }
                    })?;
                }
            }
        }
        Ok(())
    }
}

/// Records invocations instead of running them.
#[derive(Debug, Clone, Default)]
pub struct RecordingBuildStep {
    pub runs: Vec<Vec<Invocation>>,
    /// Fail with this exit code when set
    pub fail_with: Option<i32>,
}

impl BuildStep for RecordingBuildStep {
    fn run(&mut self, _source_dir: &Path, invocations: &[Invocation]) -> Result<(), ResolveError> {
        self.runs.push(invocations.to_vec());
        match self.fail_with {
            Some(code) => Err(ResolveError::BuildStepFailed {
                command: invocations.first().map(Invocation::display).unwrap_or_default(),
                code: Some(code),
                stderr: String::new(),
            }),
            None => Ok(()),
        }
    }
}
