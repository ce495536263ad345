//! Flat client options, from which every component's config is derived

use crate::cache::CacheConfig;
use crate::error::{CodexError, Result};
use crate::reference::{ProjectIdentity, ResolverConfig};
use crate::storage::{
    GitHubConfig, HttpConfig, LocalConfig, ProviderKind, StorageConfig, DEFAULT_BRANCH,
    DEFAULT_MAX_SIZE,
};
use crate::ttl::{ArtifactType, TypeRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Everything needed to build a [`crate::CodexClient`]
///
/// All fields have defaults, so a partial configuration file deserializes
/// cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodexOptions {
    // Cache
    pub cache_dir: PathBuf,
    pub default_ttl_secs: u64,
    pub stale_window_secs: u64,
    pub max_memory_entries: usize,
    pub max_memory_bytes: u64,
    pub stale_while_revalidate: bool,
    pub atomic_writes: bool,

    /// Pick per-type TTLs from document paths
    pub type_ttls: bool,
    /// Added to (or replacing) the built-in artifact types
    pub artifact_types: Vec<ArtifactType>,

    // Project
    pub base_dir: PathBuf,
    pub org: Option<String>,
    pub project: Option<String>,
    pub detect_project: bool,

    // Providers
    pub providers: Vec<ProviderKind>,
    pub default_branch: String,
    pub local_max_size: u64,

    pub github_token: Option<String>,
    pub github_raw_url: String,
    pub github_api_url: String,
    pub github_timeout_ms: u64,
    pub github_max_size: u64,

    pub http_base_url: String,
    pub http_headers: BTreeMap<String, String>,
    pub http_timeout_ms: u64,
    pub http_max_size: u64,
}

impl Default for CodexOptions {
    fn default() -> Self {
        let cache = CacheConfig::default();
        let github = GitHubConfig::default();
        let http = HttpConfig::default();

        Self {
            cache_dir: cache.cache_dir,
            default_ttl_secs: cache.default_ttl.as_secs(),
            stale_window_secs: cache.stale_window.as_secs(),
            max_memory_entries: cache.max_memory_entries,
            max_memory_bytes: cache.max_memory_bytes,
            stale_while_revalidate: cache.stale_while_revalidate,
            atomic_writes: cache.atomic_writes,
            type_ttls: true,
            artifact_types: Vec::new(),
            base_dir: PathBuf::from("."),
            org: None,
            project: None,
            detect_project: true,
            providers: ProviderKind::default_order(),
            default_branch: DEFAULT_BRANCH.to_string(),
            local_max_size: DEFAULT_MAX_SIZE,
            github_token: None,
            github_raw_url: github.raw_base_url,
            github_api_url: github.api_base_url,
            github_timeout_ms: github.timeout.as_millis() as u64,
            github_max_size: github.max_size,
            http_base_url: http.base_url,
            http_headers: BTreeMap::new(),
            http_timeout_ms: http.timeout.as_millis() as u64,
            http_max_size: http.max_size,
        }
    }
}

impl CodexOptions {
    /// Explicit current project; both halves must be set
    pub fn current_project(&self) -> Result<Option<ProjectIdentity>> {
        match (&self.org, &self.project) {
            (Some(org), Some(project)) => Ok(Some(ProjectIdentity::new(org, project))),
            (None, None) => Ok(None),
            _ => Err(CodexError::Config(
                "org and project must be configured together".to_string(),
            )),
        }
    }

    pub fn cache_config(&self) -> Result<CacheConfig> {
        let config = CacheConfig::builder()
            .cache_dir(&self.cache_dir)
            .default_ttl(Duration::from_secs(self.default_ttl_secs))
            .stale_window(Duration::from_secs(self.stale_window_secs))
            .max_memory_entries(self.max_memory_entries)
            .max_memory_bytes(self.max_memory_bytes)
            .stale_while_revalidate(self.stale_while_revalidate)
            .atomic_writes(self.atomic_writes)
            .build();
        config.validate()?;
        Ok(config)
    }

    pub fn resolver_config(&self) -> Result<ResolverConfig> {
        Ok(ResolverConfig {
            cache_dir: self.cache_dir.clone(),
            base_dir: self.base_dir.clone(),
            current_project: self.current_project()?,
            detect_from_git: self.detect_project,
        })
    }

    /// Provider chain settings; local reads are confined to `project_root`
    pub fn storage_config(&self, project_root: &Path) -> Result<StorageConfig> {
        if self.providers.is_empty() {
            return Err(CodexError::Config(
                "at least one storage provider is required".to_string(),
            ));
        }

        Ok(StorageConfig {
            priority: self.providers.clone(),
            local: LocalConfig {
                base_dir: project_root.to_path_buf(),
                max_size: self.local_max_size,
            },
            github: GitHubConfig {
                token: self.github_token.clone().filter(|t| !t.is_empty()),
                raw_base_url: self.github_raw_url.clone(),
                api_base_url: self.github_api_url.clone(),
                default_branch: self.default_branch.clone(),
                timeout: Duration::from_millis(self.github_timeout_ms),
                max_size: self.github_max_size,
            },
            http: HttpConfig {
                base_url: self.http_base_url.clone(),
                default_branch: self.default_branch.clone(),
                headers: self.http_headers.clone(),
                timeout: Duration::from_millis(self.http_timeout_ms),
                max_size: self.http_max_size,
            },
        })
    }

    /// Built-in types plus configured ones, or `None` when per-type TTLs are off
    pub fn type_registry(&self) -> Result<Option<TypeRegistry>> {
        if !self.type_ttls {
            return Ok(None);
        }

        let mut registry = TypeRegistry::with_builtins();
        for artifact in &self.artifact_types {
            registry.register(artifact.clone())?;
        }
        Ok(Some(registry))
    }
}
