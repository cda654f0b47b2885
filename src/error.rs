//! Resolver error types.

use thiserror::Error;

use crate::layout::LayoutError;
use crate::options::RegistryError;
use crate::patch::PatchError;
use crate::platform::VersionError;

/// Errors that can occur while resolving or installing a recipe.
///
/// Everything except [`ResolveError::BuildStepFailed`] and the I/O-backed
/// variants is detected before the external build step starts.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("unknown option: {0}")]
    UnknownOption(String),

    #[error("conflicting options {}: {explanation}", .options.join(" + "))]
    Conflict {
        options: Vec<String>,
        explanation: String,
    },

    #[error("dependency not found for slot {slot}: {provider}")]
    DependencyNotFound { slot: String, provider: String },

    #[error("requirement not met: {name}\n{message}")]
    RequirementNotMet { name: String, message: String },

    #[error("build step failed: {command} (exit code: {code:?})\n{stderr}")]
    BuildStepFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("unknown recipe: {0}")]
    UnknownRecipe(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error(transparent)]
    InvalidVersion(#[from] VersionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// True for errors raised before any build work could start.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ResolveError::UnknownOption(_)
                | ResolveError::Conflict { .. }
                | ResolveError::DependencyNotFound { .. }
                | ResolveError::RequirementNotMet { .. }
        )
    }
}
