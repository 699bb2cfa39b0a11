//! Mapping output descriptors onto the engine's output directory.
//!
//! Kept apart from the job loop because the subfolder layout depends
//! on the engine version.

use std::path::{Component, Path, PathBuf};

use crate::history::OutputDescriptor;

/// Resolves engine-reported output files to local paths.
#[derive(Debug, Clone)]
pub struct OutputResolver {
    output_dir: PathBuf,
}

impl OutputResolver {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `output_dir / subfolder / filename`.
    ///
    /// Returns `None` for an empty file name, or when either component
    /// would escape the output directory (absolute paths, `..`).
    pub fn candidate_path(&self, descriptor: &OutputDescriptor) -> Option<PathBuf> {
        if descriptor.filename.trim().is_empty()
            || !is_relative_inside(&descriptor.subfolder)
            || !is_relative_inside(&descriptor.filename)
        {
            return None;
        }
        let mut path = self.output_dir.clone();
        if !descriptor.subfolder.is_empty() {
            path.push(&descriptor.subfolder);
        }
        path.push(&descriptor.filename);
        Some(path)
    }

    /// The candidate path, if the file is visible on disk yet.
    pub async fn locate(&self, descriptor: &OutputDescriptor) -> Option<PathBuf> {
        let path = self.candidate_path(descriptor)?;
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Some(path),
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cannot check output file");
                None
            }
        }
    }
}

fn is_relative_inside(part: &str) -> bool {
    Path::new(part)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
