//! Storage providers and the provider chain
//!
//! A [`StorageProvider`] fetches the bytes behind a [`Reference`] from one
//! backend. The [`StorageManager`] orders providers by priority and falls back
//! from one to the next on failure.

mod github;
mod http;
mod local;
mod manager;

pub use github::{GitHubConfig, GitHubProvider};
pub use http::{HttpConfig, HttpProvider};
pub use local::{LocalConfig, LocalProvider};
pub use manager::{StorageConfig, StorageManager};

use crate::error::Result;
use crate::reference::Reference;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Default maximum document size accepted by any provider (10 MiB)
pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;

/// Default network timeout for remote providers
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default branch for remote content
pub const DEFAULT_BRANCH: &str = "main";

/// Metadata key carrying the `ETag` response header
pub const META_ETAG: &str = "etag";

/// Metadata key carrying the `Last-Modified` response header
pub const META_LAST_MODIFIED: &str = "lastModified";

/// A primitive metadata value. The closed set keeps sidecar files stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        MetadataValue::String(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        MetadataValue::String(s)
    }
}

impl From<i64> for MetadataValue {
    fn from(n: i64) -> Self {
        MetadataValue::Integer(n)
    }
}

impl From<u16> for MetadataValue {
    fn from(n: u16) -> Self {
        MetadataValue::Integer(n as i64)
    }
}

impl From<bool> for MetadataValue {
    fn from(b: bool) -> Self {
        MetadataValue::Bool(b)
    }
}

/// Provider-specific metadata, keyed by field name
pub type ProviderMetadata = BTreeMap<String, MetadataValue>;

/// Outcome of a successful provider fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub content: Vec<u8>,
    pub content_type: String,
    pub size: u64,
    /// Where the content came from (provider name or URL)
    pub source: String,
    pub metadata: ProviderMetadata,
}

impl FetchResult {
    pub fn new(content: Vec<u8>, content_type: impl Into<String>, source: impl Into<String>) -> Self {
        let size = content.len() as u64;
        Self {
            content,
            content_type: content_type.into(),
            size,
            source: source.into(),
            metadata: ProviderMetadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(MetadataValue::as_str)
    }

    /// Content as UTF-8 text, lossily
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Per-call fetch options
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Branch or ref for remote providers
    pub branch: Option<String>,
    /// Overrides the provider's configured timeout
    pub timeout: Option<Duration>,
    /// Overrides the provider's configured size ceiling
    pub max_size: Option<u64>,
    /// Fetch this URL instead of deriving one from the reference
    pub url: Option<String>,
}

impl FetchOptions {
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// The built-in provider kinds, used to express priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Local,
    #[serde(alias = "vcs")]
    Github,
    Http,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Local => "local",
            ProviderKind::Github => "github",
            ProviderKind::Http => "http",
        }
    }

    /// Default priority order
    pub fn default_order() -> Vec<ProviderKind> {
        vec![ProviderKind::Local, ProviderKind::Github, ProviderKind::Http]
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = crate::error::CodexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ProviderKind::Local),
            "github" | "vcs" => Ok(ProviderKind::Github),
            "http" => Ok(ProviderKind::Http),
            other => Err(crate::error::CodexError::Config(format!(
                "unknown storage provider: {}",
                other
            ))),
        }
    }
}

/// One backend able to fetch documents for a subset of references
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short provider name used in logs and error aggregation
    fn name(&self) -> &str;

    fn can_handle(&self, reference: &Reference) -> bool;

    /// Fetch the document. Fails with `NotFound`, `Timeout`, `TooLarge` or `Transport`.
    async fn fetch(&self, reference: &Reference, options: &FetchOptions) -> Result<FetchResult>;

    /// Whether the document exists. Never fails; errors read as `false`.
    async fn exists(&self, reference: &Reference, options: &FetchOptions) -> bool;
}

/// Guess a MIME type from a file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("md") | Some("markdown") => "text/markdown",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("yaml") | Some("yml") => "application/yaml",
        Some("toml") => "application/toml",
        Some("html") | Some("htm") => "text/html",
        Some("xml") => "application/xml",
        Some("csv") => "text/csv",
        Some("js") | Some("mjs") => "text/javascript",
        Some("ts") => "text/typescript",
        Some("py") => "text/x-python",
        Some("rs") => "text/x-rust",
        Some("sh") => "application/x-sh",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("svg") => "image/svg+xml",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
