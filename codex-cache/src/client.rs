//! High-level client: resolve a URI, then read it through the cache

use crate::cache::{CacheManager, CacheMetadata, CacheStats, GetOptions};
use crate::error::{CodexError, Result};
use crate::options::CodexOptions;
use crate::reference::{Reference, ReferenceResolver};
use crate::storage::{FetchOptions, FetchResult, StorageManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Per-call fetch settings
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub branch: Option<String>,
    pub ttl: Option<Duration>,
    /// Go straight to the providers, then reseed the cache with the result
    pub bypass_cache: bool,
}

impl FetchRequest {
    fn get_options(&self) -> GetOptions {
        GetOptions {
            ttl: self.ttl,
            fetch: FetchOptions {
                branch: self.branch.clone(),
                ..Default::default()
            },
        }
    }
}

/// Entry point for reading `codex://` documents
#[derive(Clone)]
pub struct CodexClient {
    resolver: ReferenceResolver,
    cache: CacheManager,
}

impl CodexClient {
    /// Build the resolver, provider chain and cache from options
    pub fn new(options: &CodexOptions) -> Result<Self> {
        let resolver = ReferenceResolver::new(options.resolver_config()?);
        let storage = StorageManager::new(options.storage_config(resolver.project_root())?)?;

        let mut cache = CacheManager::new(options.cache_config()?, storage);
        if let Some(registry) = options.type_registry()? {
            cache = cache.with_type_registry(Arc::new(registry));
        }

        info!(
            "Codex client ready (project: {}, providers: {})",
            resolver
                .current_project()
                .map(|p| format!("{}/{}", p.org, p.project))
                .unwrap_or_else(|| "none".to_string()),
            cache.storage().provider_names().join(", ")
        );

        Ok(Self { resolver, cache })
    }

    pub fn from_parts(resolver: ReferenceResolver, cache: CacheManager) -> Self {
        Self { resolver, cache }
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn resolve(&self, uri: &str) -> Option<Reference> {
        self.resolver.resolve(uri)
    }

    fn resolve_required(&self, uri: &str) -> Result<Reference> {
        self.resolver
            .resolve(uri)
            .ok_or_else(|| CodexError::InvalidReference(uri.to_string()))
    }

    pub async fn fetch(&self, uri: &str, request: &FetchRequest) -> Result<FetchResult> {
        let reference = self.resolve_required(uri)?;
        let options = request.get_options();

        if !request.bypass_cache {
            return self.cache.get(&reference, &options).await;
        }

        debug!("Bypassing cache for {}", reference.uri);
        let result = self.cache.storage().fetch(&reference, &options.fetch).await?;
        self.cache
            .set(&reference.uri, result.clone(), request.ttl)
            .await?;
        Ok(result)
    }

    /// True when a live cache entry exists or any provider has the document
    pub async fn exists(&self, uri: &str) -> Result<bool> {
        let reference = self.resolve_required(uri)?;
        if self.cache.has(&reference.uri).await {
            return Ok(true);
        }
        Ok(self
            .cache
            .storage()
            .exists(&reference, &FetchOptions::default())
            .await)
    }

    /// Metadata of every entry on disk, sorted by URI
    pub async fn list_cached(&self) -> Result<Vec<CacheMetadata>> {
        self.cache.persistence().list_metadata().await
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.cache.get_stats().await
    }

    pub async fn invalidate(&self, uri: &str) -> Result<bool> {
        let reference = self.resolve_required(uri)?;
        self.cache.invalidate(&reference.uri).await
    }

    pub async fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        self.cache.invalidate_pattern(pattern).await
    }

    pub async fn clear(&self) -> Result<usize> {
        self.cache.clear().await
    }

    pub async fn clear_expired(&self) -> Result<usize> {
        self.cache.clear_expired().await
    }

    /// Warm the cache; URIs that do not resolve are skipped
    pub async fn preload(&self, uris: &[&str]) -> usize {
        let references: Vec<Reference> = uris
            .iter()
            .filter_map(|uri| self.resolver.resolve(uri))
            .collect();
        self.cache.preload(&references, &GetOptions::default()).await
    }

    /// Wait for background refreshes before exiting
    pub async fn shutdown(&self) {
        self.cache.wait_for_refreshes().await;
    }
}
