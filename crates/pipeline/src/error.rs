//! Unified error type handed to the request layer.
//!
//! Every fatal condition from the lower crates converts into
//! [`PipelineError`]. [`PipelineError::kind`] gives the caller a stable
//! category; `Display` gives the human-readable detail.

use comfyfront_comfyui::api::ComfyUIApiError;
use comfyfront_comfyui::job::JobError;
use comfyfront_comfyui::staging::StagingError;
use comfyfront_core::error::CoreError;
use comfyfront_core::task::TaskKind;

use crate::config::ConfigError;

/// Stable category of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TemplateNotFound,
    InvalidTemplate,
    RequiredNodeMissing,
    SourceNotFound,
    StagingIo,
    SubmissionFailed,
    GenerationTimeout,
    UnexpectedArtifact,
    Config,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build engine client: {0}")]
    Client(#[from] ComfyUIApiError),

    /// The job finished but its result had the wrong shape (a file
    /// where text was expected, or the reverse).
    #[error("{task} job produced a {found} result, expected {expected}")]
    UnexpectedArtifact {
        task: TaskKind,
        expected: &'static str,
        found: &'static str,
    },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Core(CoreError::TemplateNotFound { .. }) => ErrorKind::TemplateNotFound,
            // An unreadable template is as unusable as a missing one.
            PipelineError::Core(CoreError::Io { .. }) => ErrorKind::TemplateNotFound,
            PipelineError::Core(CoreError::InvalidTemplate(_)) => ErrorKind::InvalidTemplate,
            PipelineError::Core(CoreError::RequiredNodeMissing { .. }) => {
                ErrorKind::RequiredNodeMissing
            }
            PipelineError::Staging(StagingError::SourceNotFound(_)) => ErrorKind::SourceNotFound,
            PipelineError::Staging(StagingError::Io { .. }) => ErrorKind::StagingIo,
            PipelineError::Job(JobError::SubmissionFailed(_)) => ErrorKind::SubmissionFailed,
            PipelineError::Job(JobError::GenerationTimeout { .. }) => ErrorKind::GenerationTimeout,
            PipelineError::UnexpectedArtifact { .. } => ErrorKind::UnexpectedArtifact,
            PipelineError::Config(_) | PipelineError::Client(_) => ErrorKind::Config,
        }
    }

    /// Whether the failure came from the engine taking too long rather
    /// than from a rejected or broken request.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::GenerationTimeout
    }
}
