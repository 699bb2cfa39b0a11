//! Per-task node roles, staging prefixes and output locations.
//!
//! Each task module turns caller parameters into a [`TaskPlan`]: which
//! template to load, what to write into it, and where the result shows
//! up in history. The orchestrator runs every plan the same way.

pub mod lipsync;
pub mod speech;
pub mod transcription;

use std::path::PathBuf;

use comfyfront_comfyui::history::OutputSelector;
use comfyfront_comfyui::staging::{InputStager, StagedInput, StagingError};
use comfyfront_core::injection::FieldUpdate;
use comfyfront_core::task::TaskKind;

/// Everything needed to run one job after its inputs are staged.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    pub task: TaskKind,
    /// Requested template variant; unknown values use the task default.
    pub variant: Option<String>,
    pub updates: Vec<FieldUpdate>,
    pub output: OutputSelector,
}

/// Media supplied by the caller, either already on disk or in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaInput {
    File(PathBuf),
    Bytes { data: Vec<u8>, file_name: String },
}

impl MediaInput {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        MediaInput::File(path.into())
    }

    pub fn bytes(data: impl Into<Vec<u8>>, file_name: impl Into<String>) -> Self {
        MediaInput::Bytes {
            data: data.into(),
            file_name: file_name.into(),
        }
    }

    /// Copy this input into the engine's input directory.
    ///
    /// In-memory uploads with a blank name are staged as `fallback_name`.
    pub async fn stage(
        &self,
        stager: &InputStager,
        role_prefix: &str,
        fallback_name: &str,
    ) -> Result<StagedInput, StagingError> {
        match self {
            MediaInput::File(path) => stager.stage(path, role_prefix).await,
            MediaInput::Bytes { data, file_name } => {
                let name = if file_name.trim().is_empty() {
                    fallback_name
                } else {
                    file_name.as_str()
                };
                stager.stage_bytes(data, name, role_prefix).await
            }
        }
    }
}
