//! Loading workflow templates from the template directory.
//!
//! Templates are plain API-format JSON files laid out by task:
//!
//! ```text
//! <root>/audio/audio_caption_api.json
//! <root>/audio/voxcpm_tts_api.json
//! <root>/lipsync/WAN-INFINITE-TALK-{256,512,768}.json
//! ```
//!
//! Every call re-reads the file, so edits to a template take effect on
//! the next job without a restart.

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::CoreError;
use crate::task::TaskKind;
use crate::workflow::Workflow;

/// Read-only access to the workflow template directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Full path of the template backing `(task, variant)`, after
    /// variant fallback.
    pub fn template_path(&self, task: TaskKind, variant: Option<&str>) -> PathBuf {
        self.locate(task, variant).1
    }

    fn locate(&self, task: TaskKind, variant: Option<&str>) -> (&'static str, PathBuf) {
        let resolved = task.resolve_variant(variant);
        (resolved, self.root.join(task.template_file(resolved)))
    }

    /// Load the template for `task`.
    ///
    /// Unknown variants fall back to the task's default. Fails with
    /// [`CoreError::TemplateNotFound`] when the backing file is absent.
    pub async fn load(&self, task: TaskKind, variant: Option<&str>) -> Result<Workflow, CoreError> {
        let (resolved, path) = self.locate(task, variant);

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CoreError::TemplateNotFound {
                    task: task.as_str(),
                    variant: resolved.to_string(),
                    path,
                });
            }
            Err(source) => return Err(CoreError::Io { path, source }),
        };

        let json: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            CoreError::InvalidTemplate(format!("{} is not valid JSON: {e}", path.display()))
        })?;

        let workflow = Workflow::from_json(json)?;
        tracing::debug!(
            task = task.as_str(),
            variant = resolved,
            nodes = workflow.len(),
            path = %path.display(),
            "Loaded workflow template",
        );
        Ok(workflow)
    }
}
