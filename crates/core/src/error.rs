use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Workflow template not found for {task} ({variant}): {}", .path.display())]
    TemplateNotFound {
        task: &'static str,
        variant: String,
        path: PathBuf,
    },

    #[error("Invalid workflow template: {0}")]
    InvalidTemplate(String),

    #[error(
        "Required node missing for role '{role}' (class_type {class_type}, fallback id {})",
        .fallback_id.unwrap_or("<none>")
    )]
    RequiredNodeMissing {
        role: &'static str,
        class_type: &'static str,
        fallback_id: Option<&'static str>,
    },

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
