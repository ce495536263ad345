//! Priority-ordered provider chain with fallback

use crate::error::{CodexError, ProviderFailure, Result};
use crate::reference::Reference;
use crate::storage::{
    FetchOptions, FetchResult, GitHubConfig, GitHubProvider, HttpConfig, HttpProvider,
    LocalConfig, LocalProvider, ProviderKind, StorageProvider,
};
use futures::future::join_all;
use std::sync::Arc;
use tracing::debug;

/// Provider chain settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Providers in the order they are tried
    pub priority: Vec<ProviderKind>,
    pub local: LocalConfig,
    pub github: GitHubConfig,
    pub http: HttpConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            priority: ProviderKind::default_order(),
            local: LocalConfig::default(),
            github: GitHubConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Fetches a reference from the first capable provider, falling back to the
/// next one on failure
#[derive(Clone)]
pub struct StorageManager {
    providers: Vec<Arc<dyn StorageProvider>>,
}

impl StorageManager {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let mut providers: Vec<Arc<dyn StorageProvider>> = Vec::new();
        for kind in &config.priority {
            if providers.iter().any(|p| p.name() == kind.as_str()) {
                continue;
            }
            let provider: Arc<dyn StorageProvider> = match kind {
                ProviderKind::Local => Arc::new(LocalProvider::new(config.local.clone())),
                ProviderKind::Github => Arc::new(GitHubProvider::new(config.github.clone())?),
                ProviderKind::Http => Arc::new(HttpProvider::new(config.http.clone())?),
            };
            providers.push(provider);
        }
        Ok(Self { providers })
    }

    /// Build a chain from explicit providers, tried in the given order
    pub fn with_providers(providers: Vec<Arc<dyn StorageProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub async fn fetch(&self, reference: &Reference, options: &FetchOptions) -> Result<FetchResult> {
        let mut failures: Vec<(String, CodexError)> = Vec::new();

        for provider in self.providers.iter().filter(|p| p.can_handle(reference)) {
            debug!("Fetching {} via {}", reference.uri, provider.name());
            match provider.fetch(reference, options).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    debug!("Provider {} failed for {}: {}", provider.name(), reference.uri, e);
                    failures.push((provider.name().to_string(), e));
                }
            }
        }

        Err(fold_failures(&reference.uri, failures))
    }

    /// Fetch several references concurrently; one result per reference, in order
    pub async fn fetch_many(
        &self,
        references: &[Reference],
        options: &FetchOptions,
    ) -> Vec<Result<FetchResult>> {
        join_all(references.iter().map(|r| self.fetch(r, options))).await
    }

    pub async fn exists(&self, reference: &Reference, options: &FetchOptions) -> bool {
        for provider in self.providers.iter().filter(|p| p.can_handle(reference)) {
            if provider.exists(reference, options).await {
                return true;
            }
        }
        false
    }
}

/// Reduce failed attempts to one error: none tried is `Unhandled`, a single
/// failure is returned as is, several are wrapped with the first as cause.
fn fold_failures(uri: &str, failures: Vec<(String, CodexError)>) -> CodexError {
    if failures.len() <= 1 {
        return match failures.into_iter().next() {
            Some((_, err)) => err,
            None => CodexError::Unhandled {
                uri: uri.to_string(),
            },
        };
    }

    let attempts = failures
        .iter()
        .map(|(provider, err)| ProviderFailure {
            provider: provider.clone(),
            message: err.to_string(),
        })
        .collect();
    let first = failures
        .into_iter()
        .next()
        .map(|(_, err)| err)
        .unwrap_or(CodexError::Unhandled {
            uri: uri.to_string(),
        });

    CodexError::AllProvidersFailed {
        first: Box::new(first),
        attempts,
    }
}
