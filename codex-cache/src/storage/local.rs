//! Working-tree provider for references into the current project

use crate::error::{CodexError, Result};
use crate::reference::Reference;
use crate::storage::{
    content_type_for, FetchOptions, FetchResult, StorageProvider, DEFAULT_MAX_SIZE,
    META_LAST_MODIFIED,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Working tree root; reads never leave it
    pub base_dir: PathBuf,
    pub max_size: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// Reads documents of the current project straight from disk
pub struct LocalProvider {
    config: LocalConfig,
}

impl LocalProvider {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    fn target_path(&self, reference: &Reference) -> PathBuf {
        match &reference.local_path {
            Some(path) => path.clone(),
            None => self.config.base_dir.join(&reference.path),
        }
    }

    /// Reject targets that resolve outside the base directory, e.g. via symlinks
    async fn ensure_contained(&self, path: &Path, uri: &str) -> Result<()> {
        let base = tokio::fs::canonicalize(&self.config.base_dir).await?;
        let target = tokio::fs::canonicalize(path).await?;
        if !target.starts_with(&base) {
            return Err(CodexError::InvalidReference(format!(
                "{} resolves outside {}",
                uri,
                base.display()
            )));
        }
        Ok(())
    }
}

fn not_found_or(err: std::io::Error, uri: &str) -> CodexError {
    if err.kind() == ErrorKind::NotFound {
        CodexError::NotFound(uri.to_string())
    } else {
        CodexError::Transport(format!("failed to read {}: {}", uri, err))
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn can_handle(&self, reference: &Reference) -> bool {
        reference.is_current_project && reference.local_path.is_some()
    }

    async fn fetch(&self, reference: &Reference, options: &FetchOptions) -> Result<FetchResult> {
        let path = self.target_path(reference);
        let max_size = options.max_size.unwrap_or(self.config.max_size);

        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| not_found_or(e, &reference.uri))?;
        if !metadata.is_file() {
            return Err(CodexError::NotFound(reference.uri.clone()));
        }
        if metadata.len() > max_size {
            return Err(CodexError::TooLarge {
                size: metadata.len(),
                max_size,
            });
        }

        self.ensure_contained(&path, &reference.uri)
            .await
            .map_err(|e| match e {
                CodexError::PersistenceIo(io) => not_found_or(io, &reference.uri),
                other => other,
            })?;

        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or(e, &reference.uri))?;
        if content.len() as u64 > max_size {
            return Err(CodexError::TooLarge {
                size: content.len() as u64,
                max_size,
            });
        }

        debug!("Read {} bytes from {}", content.len(), path.display());

        let mut result = FetchResult::new(content, content_type_for(&path), "local")
            .with_metadata("path", path.display().to_string());

        if let Ok(modified) = metadata.modified() {
            let modified: DateTime<Utc> = modified.into();
            result = result
                .with_metadata("mtime", modified.timestamp_millis())
                .with_metadata(META_LAST_MODIFIED, modified.to_rfc2822());
        }

        Ok(result)
    }

    async fn exists(&self, reference: &Reference, _options: &FetchOptions) -> bool {
        let path = self.target_path(reference);
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        is_file && self.ensure_contained(&path, &reference.uri).await.is_ok()
    }
}
