//! Scratch-directory staging for uploaded media
//!
//! Each upload is written to `<root>/<millis>-<uuid>-<sanitized name>`.
//! The generated prefix makes paths unique across concurrent requests; the
//! client-supplied name is reduced to a single safe path component so it
//! can never steer the file outside the scratch root.
//!
//! A [`StagedFile`] owns its file. Callers release it explicitly; if the
//! owning future is cancelled or panics first, `Drop` removes the file.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

/// Longest sanitized filename kept as the staged suffix
const MAX_NAME_LEN: usize = 96;
/// Longest extension preserved when a name is truncated
const MAX_EXT_LEN: usize = 16;
/// Suffix used when nothing usable survives sanitization
const FALLBACK_NAME: &str = "upload";

/// Staging errors
#[derive(Debug, Error)]
pub enum StagingError {
    /// Scratch root could not be created
    #[error("Failed to create scratch directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Upload bytes could not be written
    #[error("Failed to write staged file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Generated path left the scratch root
    #[error("Staged path escapes scratch root: {0}")]
    PathEscape(PathBuf),

    /// Capacity semaphore closed (store shutting down)
    #[error("Staging store is closed")]
    Closed,
}

/// Staging store configuration
#[derive(Debug, Clone)]
pub struct StagingConfig {
    /// Scratch directory; created on first use
    pub root: PathBuf,
    /// Upper bound on files staged at the same time
    pub max_staged_files: usize,
}

/// Writes uploads into the scratch directory
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
    capacity: Arc<Semaphore>,
}

impl StagingStore {
    pub fn new(config: StagingConfig) -> Self {
        let root = if config.root.is_relative() {
            std::env::current_dir()
                .map(|cwd| cwd.join(&config.root))
                .unwrap_or(config.root)
        } else {
            config.root
        };

        Self {
            root,
            capacity: Arc::new(Semaphore::new(config.max_staged_files.max(1))),
        }
    }

    /// Absolute scratch root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Refuse further staging; files already staged are unaffected
    pub fn close(&self) {
        self.capacity.close();
    }

    /// Write `bytes` to a freshly allocated scratch path
    ///
    /// Waits for a free slot when `max_staged_files` uploads are already
    /// staged. Never overwrites an existing file.
    pub async fn stage(&self, bytes: &[u8], original_name: &str) -> Result<StagedFile, StagingError> {
        let permit = Arc::clone(&self.capacity)
            .acquire_owned()
            .await
            .map_err(|_| StagingError::Closed)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StagingError::CreateDir {
                path: self.root.clone(),
                source,
            })?;

        let file_name = format!(
            "{}-{}-{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            sanitize_file_name(original_name)
        );
        let path = self.root.join(file_name);
        if path.parent() != Some(self.root.as_path()) {
            return Err(StagingError::PathEscape(path));
        }

        // From here on the guard owns the path, so a failed write is cleaned up
        let staged = StagedFile {
            path,
            released: false,
            _permit: permit,
        };

        if let Err(source) = write_new_file(&staged.path, bytes).await {
            let path = staged.path.clone();
            staged.release().await;
            return Err(StagingError::Write { path, source });
        }

        tracing::debug!(
            staged_path = %staged.path.display(),
            bytes = bytes.len(),
            "Upload staged"
        );

        Ok(staged)
    }
}

async fn write_new_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// A staged upload, removed from disk exactly once
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    released: bool,
    _permit: OwnedSemaphorePermit,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged file
    ///
    /// A file that is already gone counts as released. Other failures are
    /// logged and swallowed: cleanup never replaces the primary outcome.
    pub async fn release(mut self) {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!(staged_path = %self.path.display(), "Staged file released");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    staged_path = %self.path.display(),
                    error = %e,
                    "Failed to remove staged file"
                );
            }
        }
        self.released = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(
                    staged_path = %self.path.display(),
                    "Staged file removed on drop"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    staged_path = %self.path.display(),
                    error = %e,
                    "Failed to remove staged file on drop"
                );
            }
        }
    }
}

/// Reduce an untrusted client filename to one safe path component
///
/// Directory parts (`/` or `\`) are discarded, characters outside
/// `[A-Za-z0-9._-]` become `_`, leading dots are stripped and long names
/// are truncated with their extension preserved.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        return FALLBACK_NAME.to_string();
    }

    if cleaned.len() <= MAX_NAME_LEN {
        return cleaned.to_string();
    }

    // ASCII only at this point, so byte slicing is char-safe
    match cleaned.rfind('.') {
        Some(dot) if cleaned.len() - dot <= MAX_EXT_LEN + 1 => {
            let ext = &cleaned[dot..];
            let stem = &cleaned[..MAX_NAME_LEN - ext.len()];
            format!("{}{}", stem, ext)
        }
        _ => cleaned[..MAX_NAME_LEN].to_string(),
    }
}
