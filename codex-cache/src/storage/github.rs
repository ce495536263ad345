//! Remote VCS provider for GitHub-hosted projects
//!
//! Tries the unauthenticated raw-content host first. When that fails and a
//! token is configured, retries through the authenticated contents API,
//! which also covers private repositories.

use crate::error::{CodexError, Result};
use crate::reference::Reference;
use crate::storage::http::{read_limited, transport_error, with_timeout};
use crate::storage::{
    content_type_for, FetchOptions, FetchResult, StorageProvider, DEFAULT_BRANCH,
    DEFAULT_MAX_SIZE, DEFAULT_TIMEOUT, META_ETAG, META_LAST_MODIFIED,
};
use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG, LAST_MODIFIED};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// Bearer token for the contents API
    pub token: Option<String>,
    pub raw_base_url: String,
    pub api_base_url: String,
    pub default_branch: String,
    pub timeout: Duration,
    pub max_size: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            raw_base_url: "https://raw.githubusercontent.com".to_string(),
            api_base_url: "https://api.github.com".to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

/// Contents API response for a single file
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

pub struct GitHubProvider {
    config: GitHubConfig,
    client: Client,
}

impl GitHubProvider {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("codex-cache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CodexError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn branch<'a>(&'a self, options: &'a FetchOptions) -> &'a str {
        options
            .branch
            .as_deref()
            .unwrap_or(&self.config.default_branch)
    }

    pub fn raw_url(&self, reference: &Reference, branch: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.config.raw_base_url.trim_end_matches('/'),
            reference.org,
            reference.project,
            branch,
            reference.path
        )
    }

    pub fn api_url(&self, reference: &Reference, branch: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.config.api_base_url.trim_end_matches('/'),
            reference.org,
            reference.project,
            reference.path,
            branch
        )
    }

    async fn fetch_raw(&self, reference: &Reference, branch: &str, max_size: u64) -> Result<FetchResult> {
        let url = self.raw_url(reference, branch);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| transport_error(e, &url))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CodexError::NotFound(reference.uri.clone()));
        }
        if !status.is_success() {
            return Err(CodexError::Transport(format!("HTTP {}: {}", status, url)));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let content = read_limited(response, max_size, &url).await?;

        // The raw host serves everything as text/plain
        let mut result = FetchResult::new(content, content_type_for(Path::new(&reference.path)), "github")
            .with_metadata("method", "raw")
            .with_metadata("url", url)
            .with_metadata("branch", branch);
        if let Some(etag) = etag {
            result = result.with_metadata(META_ETAG, etag);
        }
        if let Some(last_modified) = last_modified {
            result = result.with_metadata(META_LAST_MODIFIED, last_modified);
        }
        Ok(result)
    }

    async fn fetch_api(
        &self,
        reference: &Reference,
        branch: &str,
        token: &str,
        max_size: u64,
    ) -> Result<FetchResult> {
        let url = self.api_url(reference, branch);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| transport_error(e, &url))?;

        let status = response.status();
        match status {
            StatusCode::NOT_FOUND => return Err(CodexError::NotFound(reference.uri.clone())),
            StatusCode::UNAUTHORIZED => {
                return Err(CodexError::Transport("GitHub authentication failed".to_string()))
            }
            StatusCode::FORBIDDEN => {
                let rate_limited = response
                    .headers()
                    .get("x-ratelimit-remaining")
                    .and_then(|v| v.to_str().ok())
                    == Some("0");
                let message = if rate_limited {
                    "GitHub rate limit exceeded"
                } else {
                    "GitHub access denied"
                };
                return Err(CodexError::Transport(message.to_string()));
            }
            s if !s.is_success() => {
                return Err(CodexError::Transport(format!("GitHub API error: HTTP {}", s)))
            }
            _ => {}
        }

        let body = read_limited(response, max_size.saturating_mul(2), &url).await?;
        let contents: ContentsResponse = serde_json::from_slice(&body)?;
        if contents.kind != "file" {
            return Err(CodexError::NotFound(format!(
                "{} is a {}, not a file",
                reference.uri, contents.kind
            )));
        }

        let content = match contents.content.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(encoded) => {
                let cleaned: String = encoded.split_whitespace().collect();
                base64::engine::general_purpose::STANDARD
                    .decode(cleaned)
                    .map_err(|e| CodexError::Transport(format!("invalid base64 content: {}", e)))?
            }
            None => {
                // Files over the inline limit come back without content
                let download_url = contents.download_url.as_deref().ok_or_else(|| {
                    CodexError::Transport(format!("no content or download link for {}", url))
                })?;
                self.download(download_url, token, max_size).await?
            }
        };

        if content.len() as u64 > max_size {
            return Err(CodexError::TooLarge {
                size: content.len() as u64,
                max_size,
            });
        }

        let mut result = FetchResult::new(content, content_type_for(Path::new(&reference.path)), "github")
            .with_metadata("method", "api")
            .with_metadata("url", url)
            .with_metadata("branch", branch);
        if let Some(sha) = contents.sha {
            result = result
                .with_metadata(META_ETAG, format!("\"{}\"", sha))
                .with_metadata("sha", sha);
        }
        Ok(result)
    }

    async fn download(&self, url: &str, token: &str, max_size: u64) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| transport_error(e, url))?;
        if !response.status().is_success() {
            return Err(CodexError::Transport(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }
        read_limited(response, max_size, url).await
    }
}

#[async_trait]
impl StorageProvider for GitHubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn can_handle(&self, reference: &Reference) -> bool {
        !reference.is_current_project
    }

    async fn fetch(&self, reference: &Reference, options: &FetchOptions) -> Result<FetchResult> {
        if reference.path.is_empty() {
            return Err(CodexError::NotFound(reference.uri.clone()));
        }

        let branch = self.branch(options);
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let max_size = options.max_size.unwrap_or(self.config.max_size);

        let raw = with_timeout(
            timeout,
            &self.raw_url(reference, branch),
            self.fetch_raw(reference, branch, max_size),
        )
        .await;

        let raw_err = match raw {
            Ok(result) => return Ok(result),
            Err(e @ CodexError::TooLarge { .. }) => return Err(e),
            Err(e) => e,
        };

        let Some(token) = self.config.token.as_deref() else {
            return Err(raw_err);
        };

        debug!("Raw fetch of {} failed ({}), retrying via API", reference.uri, raw_err);
        with_timeout(
            timeout,
            &self.api_url(reference, branch),
            self.fetch_api(reference, branch, token, max_size),
        )
        .await
    }

    async fn exists(&self, reference: &Reference, options: &FetchOptions) -> bool {
        if reference.path.is_empty() {
            return false;
        }
        let branch = self.branch(options);
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let request = match self.config.token.as_deref() {
            Some(token) => self
                .client
                .head(self.api_url(reference, branch))
                .header(AUTHORIZATION, format!("Bearer {}", token)),
            None => self.client.head(self.raw_url(reference, branch)),
        };

        match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{ProjectIdentity, ReferenceResolver, ResolverConfig};

    fn resolver() -> ReferenceResolver {
        ReferenceResolver::new(ResolverConfig {
            current_project: Some(ProjectIdentity::new("acme", "app")),
            detect_from_git: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_urls() {
        let provider = GitHubProvider::new(GitHubConfig::default()).unwrap();
        let reference = resolver().resolve("codex://acme/handbook/docs/api.md").unwrap();

        assert_eq!(
            provider.raw_url(&reference, "main"),
            "https://raw.githubusercontent.com/acme/handbook/main/docs/api.md"
        );
        assert_eq!(
            provider.api_url(&reference, "dev"),
            "https://api.github.com/repos/acme/handbook/contents/docs/api.md?ref=dev"
        );
    }

    #[test]
    fn test_handles_only_other_projects() {
        let provider = GitHubProvider::new(GitHubConfig::default()).unwrap();
        let resolver = resolver();

        let other = resolver.resolve("codex://acme/handbook/docs/api.md").unwrap();
        let current = resolver.resolve("codex://acme/app/docs/api.md").unwrap();
        assert!(provider.can_handle(&other));
        assert!(!provider.can_handle(&current));
    }

    #[tokio::test]
    async fn test_root_reference_not_found() {
        let provider = GitHubProvider::new(GitHubConfig::default()).unwrap();
        let reference = resolver().resolve("codex://acme/handbook").unwrap();
        let err = provider
            .fetch(&reference, &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CodexError::NotFound(_)));
    }
}
