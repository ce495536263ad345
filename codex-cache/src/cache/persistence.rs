//! On-disk cache store
//!
//! One content file and one JSON metadata sidecar per URI:
//!
//! ```text
//! <root>/<org>/<project>/<path>.cache
//! <root>/<org>/<project>/<path>.meta.json
//! ```
//!
//! A reference without a path is stored under the file name `index`.
//! Writes go to temporary siblings first and are renamed into place.

use crate::cache::entry::{CacheEntry, CacheMetadata};
use crate::cache::invalidation::InvalidationReason;
use crate::cache::types::CacheStats;
use crate::error::{CodexError, Result};
use crate::reference::{build_uri, parse_uri};
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Suffix of content files
pub const CONTENT_EXTENSION: &str = ".cache";

/// Suffix of metadata sidecars
pub const METADATA_EXTENSION: &str = ".meta.json";

/// File name used for references without a path
pub const INDEX_FILE: &str = "index";

/// Content and sidecar locations for one URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPaths {
    pub content: PathBuf,
    pub metadata: PathBuf,
}

/// Durable store for cache entries under a root directory
#[derive(Debug, Clone)]
pub struct CachePersistence {
    root: PathBuf,
    atomic_writes: bool,
}

impl CachePersistence {
    pub fn new(root: impl Into<PathBuf>, atomic_writes: bool) -> Self {
        Self {
            root: root.into(),
            atomic_writes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File locations for a URI, derived from the URI alone
    pub fn paths_for(&self, uri: &str) -> Result<EntryPaths> {
        let parsed = parse_uri(uri)?;
        let mut base = self.root.join(&parsed.org).join(&parsed.project);
        if parsed.path.is_empty() {
            base.push(INDEX_FILE);
        } else {
            base.push(&parsed.path);
        }

        Ok(EntryPaths {
            content: with_suffix(&base, CONTENT_EXTENSION),
            metadata: with_suffix(&base, METADATA_EXTENSION),
        })
    }

    /// Load an entry. Missing files, unreadable sidecars, sidecars written for
    /// a different URI and content that no longer matches its hash all read
    /// as `None`.
    pub async fn read(&self, uri: &str) -> Result<Option<CacheEntry>> {
        let paths = self.paths_for(uri)?;

        let Some(metadata) = self.read_owned_sidecar(uri, &paths.metadata).await? else {
            return Ok(None);
        };

        let content = match fs::read(&paths.content).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Sidecar without content for {}", uri);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let entry = CacheEntry { metadata, content };
        if !entry.verify() {
            warn!("Ignoring cached copy of {} ({})", uri, InvalidationReason::Corrupt);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Load only the metadata sidecar, `None` unless it was written for `uri`
    pub async fn read_metadata(&self, uri: &str) -> Result<Option<CacheMetadata>> {
        let paths = self.paths_for(uri)?;
        self.read_owned_sidecar(uri, &paths.metadata).await
    }

    /// Sidecar stored at the file location of `uri`, whichever URI wrote it
    async fn read_stored_metadata(&self, uri: &str) -> Result<Option<CacheMetadata>> {
        let paths = self.paths_for(uri)?;
        self.read_sidecar(&paths.metadata).await
    }

    async fn read_owned_sidecar(&self, uri: &str, path: &Path) -> Result<Option<CacheMetadata>> {
        let canonical = parse_uri(uri)?.to_uri();
        match self.read_sidecar(path).await? {
            Some(metadata) if metadata.uri == canonical => Ok(Some(metadata)),
            Some(metadata) => {
                debug!("{} holds the entry for {}, not {}", path.display(), metadata.uri, canonical);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn read_sidecar(&self, path: &Path) -> Result<Option<CacheMetadata>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) => {
                warn!("Corrupt cache sidecar {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    pub async fn write(&self, entry: &CacheEntry) -> Result<()> {
        let paths = self.paths_for(entry.uri())?;
        if let Some(parent) = paths.content.parent() {
            fs::create_dir_all(parent).await?;
        }
        let sidecar = serde_json::to_vec_pretty(&entry.metadata)?;

        if !self.atomic_writes {
            tokio::try_join!(
                fs::write(&paths.content, &entry.content),
                fs::write(&paths.metadata, &sidecar),
            )?;
            return Ok(());
        }

        let suffix = format!(".tmp-{}", Uuid::new_v4());
        let tmp_content = with_suffix(&paths.content, &suffix);
        let tmp_metadata = with_suffix(&paths.metadata, &suffix);

        let staged = tokio::try_join!(
            fs::write(&tmp_content, &entry.content),
            fs::write(&tmp_metadata, &sidecar),
        );
        if let Err(e) = staged {
            remove_quietly(&[&tmp_content, &tmp_metadata]).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&tmp_content, &paths.content).await {
            remove_quietly(&[&tmp_content, &tmp_metadata]).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp_metadata, &paths.metadata).await {
            remove_quietly(&[&tmp_metadata]).await;
            return Err(e.into());
        }

        debug!("Persisted {} ({} bytes)", entry.uri(), entry.size());
        Ok(())
    }

    /// Remove an entry; `true` if anything was on disk
    pub async fn delete(&self, uri: &str) -> Result<bool> {
        let paths = self.paths_for(uri)?;
        let content = remove_if_exists(&paths.content).await?;
        let metadata = remove_if_exists(&paths.metadata).await?;
        Ok(content || metadata)
    }

    pub async fn exists(&self, uri: &str) -> bool {
        match self.paths_for(uri) {
            Ok(paths) => fs::try_exists(&paths.content).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// URIs of every stored entry
    pub async fn list(&self) -> Result<Vec<String>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || collect_uris(&root))
            .await
            .map_err(|e| CodexError::PersistenceIo(std::io::Error::other(e)))
    }

    /// Metadata of every stored entry with a readable sidecar
    pub async fn list_metadata(&self) -> Result<Vec<CacheMetadata>> {
        let mut entries = Vec::new();
        for uri in self.list().await? {
            if let Some(metadata) = self.read_stored_metadata(&uri).await? {
                entries.push(metadata);
            }
        }
        Ok(entries)
    }

    /// Remove every entry; returns the number removed
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for uri in self.list().await? {
            if self.delete(&uri).await? {
                removed += 1;
            }
        }
        info!("Cleared {} cached entries from {}", removed, self.root.display());
        Ok(removed)
    }

    /// Remove entries whose `expires_at` has passed; returns their URIs
    pub async fn clear_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for uri in self.list().await? {
            let Some(metadata) = self.read_stored_metadata(&uri).await? else {
                continue;
            };
            if metadata.expires_at <= now && self.delete(&uri).await? {
                removed.push(uri);
            }
        }
        if !removed.is_empty() {
            info!("Removed {} expired cache entries", removed.len());
        }
        Ok(removed)
    }

    /// Counts and sizes by freshness bucket, from disk
    pub async fn stats(&self, now: DateTime<Utc>, stale_window: Duration) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for metadata in self.list_metadata().await? {
            stats.record_disk_entry(metadata.size, metadata.freshness(now, stale_window));
        }
        Ok(stats)
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

async fn remove_quietly(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove temp file {}: {}", path.display(), e);
            }
        }
    }
}

/// Walk `root/<org>/<project>/**` for content files and map them back to URIs
fn collect_uris(root: &Path) -> Vec<String> {
    let mut uris: Vec<String> = WalkDir::new(root)
        .min_depth(3)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| uri_for(root, entry.path()))
        .collect();
    uris.sort();
    uris
}

fn uri_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<&str> = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<_>>()?;
    if parts.len() < 3 {
        return None;
    }

    let rest = parts[2..].join("/");
    let doc_path = rest.strip_suffix(CONTENT_EXTENSION)?;
    let doc_path = if doc_path == INDEX_FILE { "" } else { doc_path };

    Some(build_uri(parts[0], parts[1], doc_path))
}
