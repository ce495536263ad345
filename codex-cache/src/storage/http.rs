//! Generic HTTP provider, the unconditional fallback

use crate::error::{CodexError, Result};
use crate::reference::Reference;
use crate::storage::{
    FetchOptions, FetchResult, StorageProvider, DEFAULT_BRANCH, DEFAULT_MAX_SIZE, DEFAULT_TIMEOUT,
    META_ETAG, META_LAST_MODIFIED,
};
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, ETAG, LAST_MODIFIED};
use reqwest::{Client, Response, StatusCode};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Raw-content host; URLs are `{base_url}/{org}/{project}/{branch}/{path}`
    pub base_url: String,
    pub default_branch: String,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
    pub timeout: Duration,
    pub max_size: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://raw.githubusercontent.com".to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
            max_size: DEFAULT_MAX_SIZE,
        }
    }
}

pub struct HttpProvider {
    config: HttpConfig,
    client: Client,
}

impl HttpProvider {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("codex-cache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CodexError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// URL for a reference, or the explicit URL from the options
    pub fn url_for(&self, reference: &Reference, options: &FetchOptions) -> Result<String> {
        if let Some(url) = &options.url {
            return Ok(url.clone());
        }
        if reference.path.is_empty() {
            return Err(CodexError::NotFound(reference.uri.clone()));
        }
        let branch = options
            .branch
            .as_deref()
            .unwrap_or(&self.config.default_branch);
        Ok(format!(
            "{}/{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            reference.org,
            reference.project,
            branch,
            reference.path
        ))
    }

    async fn get(&self, url: &str, max_size: u64) -> Result<FetchResult> {
        let mut request = self.client.get(url);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| transport_error(e, url))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CodexError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(CodexError::Transport(format!("HTTP {}: {}", status, url)));
        }

        let content_type = header_str(&response, CONTENT_TYPE.as_str())
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let etag = header_str(&response, ETAG.as_str()).map(str::to_string);
        let last_modified = header_str(&response, LAST_MODIFIED.as_str()).map(str::to_string);

        let content = read_limited(response, max_size, url).await?;
        debug!("Fetched {} bytes from {}", content.len(), url);

        let mut result = FetchResult::new(content, content_type, url)
            .with_metadata("url", url)
            .with_metadata("status", status.as_u16());
        if let Some(etag) = etag {
            result = result.with_metadata(META_ETAG, etag);
        }
        if let Some(last_modified) = last_modified {
            result = result.with_metadata(META_LAST_MODIFIED, last_modified);
        }
        Ok(result)
    }
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

pub(crate) fn transport_error(err: reqwest::Error, url: &str) -> CodexError {
    CodexError::Transport(format!("request to {} failed: {}", url, err))
}

/// Read a response body, enforcing `max_size` against both the declared
/// `Content-Length` and the bytes actually received.
pub(crate) async fn read_limited(mut response: Response, max_size: u64, url: &str) -> Result<Vec<u8>> {
    if let Some(declared) = response.content_length() {
        if declared > max_size {
            return Err(CodexError::TooLarge {
                size: declared,
                max_size,
            });
        }
    }

    let mut content = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| transport_error(e, url))? {
        let received = (content.len() + chunk.len()) as u64;
        if received > max_size {
            return Err(CodexError::TooLarge {
                size: received,
                max_size,
            });
        }
        content.extend_from_slice(&chunk);
    }
    Ok(content)
}

/// Run `fut` under a deadline; expiry drops the in-flight request
pub(crate) async fn with_timeout<T>(
    timeout: Duration,
    context: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(CodexError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            context: context.to_string(),
        }),
    }
}

#[async_trait]
impl StorageProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn can_handle(&self, _reference: &Reference) -> bool {
        true
    }

    async fn fetch(&self, reference: &Reference, options: &FetchOptions) -> Result<FetchResult> {
        let url = self.url_for(reference, options)?;
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let max_size = options.max_size.unwrap_or(self.config.max_size);

        with_timeout(timeout, &url, self.get(&url, max_size)).await
    }

    async fn exists(&self, reference: &Reference, options: &FetchOptions) -> bool {
        let Ok(url) = self.url_for(reference, options) else {
            return false;
        };
        let timeout = options.timeout.unwrap_or(self.config.timeout);

        let mut request = self.client.head(&url);
        for (name, value) in &self.config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match tokio::time::timeout(timeout, request.send()).await {
            Ok(Ok(response)) => response.status().is_success(),
            _ => false,
        }
    }
}
