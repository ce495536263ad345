//! Configuration for the document cache

use crate::error::{CodexError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Longest accepted `default_ttl` or `stale_window` (100 years)
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Configuration for the cache manager and its on-disk store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root of the on-disk cache tree
    pub cache_dir: PathBuf,

    /// TTL applied when neither the caller nor the type registry gives one
    pub default_ttl: Duration,

    /// How long past `expires_at` an entry may still be served while it is
    /// refreshed in the background
    pub stale_window: Duration,

    /// Maximum number of entries held in memory
    pub max_memory_entries: usize,

    /// Maximum total content bytes held in memory
    pub max_memory_bytes: u64,

    /// Serve stale entries immediately and refresh them in the background
    pub stale_while_revalidate: bool,

    /// Write through temp files and rename into place
    pub atomic_writes: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".fractary/codex/cache"),
            // 1 hour
            default_ttl: Duration::from_secs(3600),
            // 5 minutes
            stale_window: Duration::from_secs(300),
            max_memory_entries: 10_000,
            // 50 MB
            max_memory_bytes: 50 * 1024 * 1024,
            stale_while_revalidate: true,
            atomic_writes: true,
        }
    }
}

impl CacheConfig {
    /// Create a new builder for cache configuration
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_memory_entries == 0 {
            return Err(CodexError::Config(
                "max_memory_entries must be greater than 0".to_string(),
            ));
        }

        if self.max_memory_bytes == 0 {
            return Err(CodexError::Config(
                "max_memory_bytes must be greater than 0".to_string(),
            ));
        }

        if self.default_ttl.is_zero() {
            return Err(CodexError::Config(
                "default_ttl must be greater than 0".to_string(),
            ));
        }

        if self.default_ttl > MAX_TTL {
            return Err(CodexError::Config(format!(
                "default_ttl must be at most {}s",
                MAX_TTL.as_secs()
            )));
        }

        if self.stale_window > MAX_TTL {
            return Err(CodexError::Config(format!(
                "stale_window must be at most {}s",
                MAX_TTL.as_secs()
            )));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(CodexError::Config("cache_dir must not be empty".to_string()));
        }

        Ok(())
    }
}

/// Builder for cache configuration
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    cache_dir: Option<PathBuf>,
    default_ttl: Option<Duration>,
    stale_window: Option<Duration>,
    max_memory_entries: Option<usize>,
    max_memory_bytes: Option<u64>,
    stale_while_revalidate: Option<bool>,
    atomic_writes: Option<bool>,
}

impl CacheConfigBuilder {
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    pub fn stale_window(mut self, window: Duration) -> Self {
        self.stale_window = Some(window);
        self
    }

    pub fn max_memory_entries(mut self, max: usize) -> Self {
        self.max_memory_entries = Some(max);
        self
    }

    pub fn max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    pub fn stale_while_revalidate(mut self, enable: bool) -> Self {
        self.stale_while_revalidate = Some(enable);
        self
    }

    pub fn atomic_writes(mut self, enable: bool) -> Self {
        self.atomic_writes = Some(enable);
        self
    }

    /// Build the cache configuration
    pub fn build(self) -> CacheConfig {
        let defaults = CacheConfig::default();

        CacheConfig {
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            default_ttl: self.default_ttl.unwrap_or(defaults.default_ttl),
            stale_window: self.stale_window.unwrap_or(defaults.stale_window),
            max_memory_entries: self
                .max_memory_entries
                .unwrap_or(defaults.max_memory_entries),
            max_memory_bytes: self.max_memory_bytes.unwrap_or(defaults.max_memory_bytes),
            stale_while_revalidate: self
                .stale_while_revalidate
                .unwrap_or(defaults.stale_while_revalidate),
            atomic_writes: self.atomic_writes.unwrap_or(defaults.atomic_writes),
        }
    }
}
