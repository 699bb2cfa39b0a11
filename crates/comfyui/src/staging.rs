//! Copying caller media into the engine's input directory.
//!
//! Staged files are named `{role_prefix}_{epoch_seconds}_{file_name}`
//! and are never deleted by this crate; they stay behind for tracing a
//! job back to its inputs. Contents are written under a hidden
//! temporary name and then linked into place, so the engine never sees
//! a half-written file. An existing staged file is never replaced: when
//! the name for this second is taken, the next second is tried.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name used when the caller's file name sanitises to nothing.
const FALLBACK_FILE_NAME: &str = "upload";

/// How many successive timestamps to try before giving up on a name.
const MAX_NAME_ATTEMPTS: i64 = 64;

/// A file placed in the engine's input directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedInput {
    /// Bare file name, as referenced from the workflow graph.
    pub name: String,
    /// Full path on the local filesystem.
    pub path: PathBuf,
}

/// Errors raised while staging input files.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    #[error("Source file not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to stage {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes inputs into the engine's shared input directory.
#[derive(Debug, Clone)]
pub struct InputStager {
    input_dir: PathBuf,
}

impl InputStager {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }

    pub fn input_dir(&self) -> &Path {
        &self.input_dir
    }

    /// Copy `source` into the input directory under a generated name.
    ///
    /// The source file is only read. The input directory is created if
    /// missing.
    pub async fn stage(&self, source: &Path, role_prefix: &str) -> Result<StagedInput, StagingError> {
        match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(StagingError::SourceNotFound(source.to_path_buf())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StagingError::SourceNotFound(source.to_path_buf()));
            }
            Err(source_err) => {
                return Err(StagingError::Io {
                    path: source.to_path_buf(),
                    source: source_err,
                });
            }
        }

        let original = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = self.partial_path().await?;

        if let Err(e) = tokio::fs::copy(source, &partial).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_error(&partial, e));
        }
        let (name, path) = self.commit(&partial, role_prefix, &original).await?;

        tracing::info!(
            staged_name = %name,
            source = %source.display(),
            "Staged input file",
        );
        Ok(StagedInput { name, path })
    }

    /// Write raw bytes (an upload) into the input directory, named
    /// after `original_name`.
    pub async fn stage_bytes(
        &self,
        bytes: &[u8],
        original_name: &str,
        role_prefix: &str,
    ) -> Result<StagedInput, StagingError> {
        let partial = self.partial_path().await?;

        if let Err(e) = tokio::fs::write(&partial, bytes).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(io_error(&partial, e));
        }
        let (name, path) = self.commit(&partial, role_prefix, original_name).await?;

        tracing::info!(staged_name = %name, bytes = bytes.len(), "Staged uploaded input");
        Ok(StagedInput { name, path })
    }

    // ---- private helpers ----

    /// Create the input directory and pick a temporary path no other
    /// writer uses.
    async fn partial_path(&self) -> Result<PathBuf, StagingError> {
        tokio::fs::create_dir_all(&self.input_dir)
            .await
            .map_err(|e| io_error(&self.input_dir, e))?;
        Ok(self
            .input_dir
            .join(format!(".{}.partial", uuid::Uuid::new_v4().simple())))
    }

    /// Link `partial` to its final name and remove the temporary.
    ///
    /// `hard_link` fails instead of replacing an existing file, so a
    /// name already taken by another job moves on to the next second.
    async fn commit(
        &self,
        partial: &Path,
        role_prefix: &str,
        original_name: &str,
    ) -> Result<(String, PathBuf), StagingError> {
        let now = chrono::Utc::now().timestamp();
        let mut result = Err(StagingError::Io {
            path: self.input_dir.clone(),
            source: std::io::Error::new(
                ErrorKind::AlreadyExists,
                "no free staged name in the retry window",
            ),
        });

        for offset in 0..MAX_NAME_ATTEMPTS {
            let name = staged_name(role_prefix, now + offset, original_name);
            let path = self.input_dir.join(&name);
            match tokio::fs::hard_link(partial, &path).await {
                Ok(()) => {
                    result = Ok((name, path));
                    break;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    tracing::debug!(staged_name = %name, "Staged name taken, trying next second");
                }
                Err(e) => {
                    result = Err(io_error(&path, e));
                    break;
                }
            }
        }

        if let Err(e) = tokio::fs::remove_file(partial).await {
            tracing::warn!(path = %partial.display(), error = %e, "Failed to remove partial file");
        }
        result
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StagingError {
    StagingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Build `{role_prefix}_{epoch_seconds}_{original_name}` with both
/// free-text parts reduced to `[A-Za-z0-9._-]`.
pub fn staged_name(role_prefix: &str, epoch_seconds: i64, original_name: &str) -> String {
    let prefix = sanitize(role_prefix);
    let file = sanitize(original_name);
    let file = if file.trim_matches(['.', '_']).is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        file
    };
    format!("{prefix}_{epoch_seconds}_{file}")
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
