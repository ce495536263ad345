//! Configuration file discovery and environment overrides

use anyhow::{Context, Result};
use codex_cache::{parse_ttl, ArtifactType, CodexOptions, ProviderKind};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Location of the config file relative to a project root
pub const CONFIG_DIR: &str = ".fractary/codex";
pub const CONFIG_NAMES: [&str; 2] = ["config.yaml", "config.yml"];
pub const DEFAULT_CACHE_DIR: &str = ".fractary/codex/cache";

/// A TTL written either as seconds or as a duration string like `6h`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TtlValue {
    Seconds(u64),
    Text(String),
}

impl TtlValue {
    pub fn to_duration(&self) -> Result<Duration> {
        match self {
            TtlValue::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            TtlValue::Text(text) => parse_ttl(text).with_context(|| format!("invalid TTL '{}'", text)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub dir: Option<PathBuf>,
    pub default_ttl: Option<TtlValue>,
    pub stale_window: Option<TtlValue>,
    pub max_memory_entries: Option<usize>,
    pub max_memory_size: Option<u64>,
    pub stale_while_revalidate: Option<bool>,
    pub atomic_writes: Option<bool>,
    /// Per-artifact-type TTLs
    pub type_ttls: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubSection {
    pub token: Option<String>,
    pub raw_url: Option<String>,
    pub api_url: Option<String>,
    pub timeout: Option<TtlValue>,
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub base_url: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<TtlValue>,
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub providers: Option<Vec<ProviderKind>>,
    pub default_branch: Option<String>,
    pub local_max_size: Option<u64>,
    pub github: GitHubSection,
    pub http: HttpSection,
}

/// A custom artifact type as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct TypeSection {
    pub name: String,
    pub patterns: Vec<String>,
    pub ttl: TtlValue,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub description: String,
}

impl TypeSection {
    fn to_artifact(&self) -> Result<ArtifactType> {
        Ok(ArtifactType {
            name: self.name.clone(),
            patterns: self.patterns.clone(),
            ttl_seconds: self.ttl.to_duration()?.as_secs(),
            description: self.description.clone(),
            priority: self.priority,
        })
    }
}

/// `.fractary/codex/config.yaml`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub cache: CacheSection,
    pub storage: StorageSection,
    pub types: Vec<TypeSection>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Failed to parse codex config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Overlay the file's settings; relative cache paths are taken from `root`
    pub fn apply(&self, options: &mut CodexOptions, root: &Path) -> Result<()> {
        if let Some(org) = &self.organization {
            options.org = Some(org.clone());
        }
        if let Some(project) = &self.project {
            options.project = Some(project.clone());
        }

        let cache = &self.cache;
        if let Some(dir) = &cache.dir {
            options.cache_dir = root.join(dir);
        }
        if let Some(ttl) = &cache.default_ttl {
            options.default_ttl_secs = ttl.to_duration()?.as_secs();
        }
        if let Some(window) = &cache.stale_window {
            options.stale_window_secs = window.to_duration()?.as_secs();
        }
        if let Some(max) = cache.max_memory_entries {
            options.max_memory_entries = max;
        }
        if let Some(max) = cache.max_memory_size {
            options.max_memory_bytes = max;
        }
        if let Some(enabled) = cache.stale_while_revalidate {
            options.stale_while_revalidate = enabled;
        }
        if let Some(enabled) = cache.atomic_writes {
            options.atomic_writes = enabled;
        }
        if let Some(enabled) = cache.type_ttls {
            options.type_ttls = enabled;
        }

        let storage = &self.storage;
        if let Some(providers) = &storage.providers {
            options.providers = providers.clone();
        }
        if let Some(branch) = &storage.default_branch {
            options.default_branch = branch.clone();
        }
        if let Some(max) = storage.local_max_size {
            options.local_max_size = max;
        }

        let github = &storage.github;
        if let Some(token) = &github.token {
            options.github_token = Some(token.clone());
        }
        if let Some(url) = &github.raw_url {
            options.github_raw_url = url.clone();
        }
        if let Some(url) = &github.api_url {
            options.github_api_url = url.clone();
        }
        if let Some(timeout) = &github.timeout {
            options.github_timeout_ms = timeout.to_duration()?.as_millis() as u64;
        }
        if let Some(max) = github.max_size {
            options.github_max_size = max;
        }

        let http = &storage.http;
        if let Some(url) = &http.base_url {
            options.http_base_url = url.clone();
        }
        options.http_headers.extend(http.headers.clone());
        if let Some(timeout) = &http.timeout {
            options.http_timeout_ms = timeout.to_duration()?.as_millis() as u64;
        }
        if let Some(max) = http.max_size {
            options.http_max_size = max;
        }

        for section in &self.types {
            options.artifact_types.push(section.to_artifact()?);
        }

        Ok(())
    }
}

/// Search `start` and its ancestors, then the home directory, for a config file.
/// Returns the file and the project root it belongs to.
pub fn find_config_file(start: &Path) -> Option<(PathBuf, PathBuf)> {
    let home = dirs::home_dir();
    start
        .ancestors()
        .map(Path::to_path_buf)
        .chain(home)
        .find_map(|root| {
            CONFIG_NAMES
                .iter()
                .map(|name| root.join(CONFIG_DIR).join(name))
                .find(|path| path.is_file())
                .map(|path| (path, root))
        })
}

/// Apply `CODEX_*` and token variables through `lookup`
pub fn apply_env(options: &mut CodexOptions, lookup: impl Fn(&str) -> Option<String>) {
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(dir) = non_empty("CODEX_CACHE_DIR") {
        options.cache_dir = PathBuf::from(dir);
    }
    if let Some(org) = non_empty("CODEX_ORG") {
        options.org = Some(org);
    }
    if let Some(project) = non_empty("CODEX_PROJECT") {
        options.project = Some(project);
    }
    if let Some(token) = non_empty("GITHUB_TOKEN").or_else(|| non_empty("GH_TOKEN")) {
        options.github_token = Some(token);
    }
}

/// Build client options for a working directory: defaults, then the config
/// file (explicit or discovered), then the environment
pub fn load_options(workdir: &Path, explicit: Option<&Path>) -> Result<CodexOptions> {
    let mut options = CodexOptions {
        base_dir: workdir.to_path_buf(),
        ..Default::default()
    };

    let found = match explicit {
        Some(path) => Some((path.to_path_buf(), workdir.to_path_buf())),
        None => find_config_file(workdir),
    };

    let root = match &found {
        Some((path, root)) => {
            debug!("Loading config from {}", path.display());
            ConfigFile::load(path)?.apply(&mut options, root)?;
            root.clone()
        }
        None => workdir.to_path_buf(),
    };

    if options.cache_dir == Path::new(DEFAULT_CACHE_DIR) {
        options.cache_dir = root.join(DEFAULT_CACHE_DIR);
    }

    apply_env(&mut options, |key| std::env::var(key).ok());
    Ok(options)
}
