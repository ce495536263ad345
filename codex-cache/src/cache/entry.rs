//! Cache entries, their sidecar metadata and freshness classification

use crate::storage::{FetchResult, ProviderMetadata, META_ETAG, META_LAST_MODIFIED};
use chrono::serde::ts_milliseconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Freshness of an entry relative to its expiry and the stale window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// Before `expires_at`
    Fresh,
    /// Past `expires_at` but inside the stale window
    Stale,
    /// Past the stale window
    Expired,
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Freshness::Fresh => write!(f, "fresh"),
            Freshness::Stale => write!(f, "stale"),
            Freshness::Expired => write!(f, "expired"),
        }
    }
}

/// Metadata persisted next to each cached document (`*.meta.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    pub uri: String,

    #[serde(with = "ts_milliseconds")]
    pub cached_at: DateTime<Utc>,

    /// Always `cached_at + ttl_seconds`
    #[serde(with = "ts_milliseconds")]
    pub expires_at: DateTime<Utc>,

    pub ttl_seconds: u64,

    /// Change-detection hash of the content, see [`content_hash`]
    pub content_hash: String,

    pub size: u64,

    pub content_type: String,

    pub source: String,

    pub access_count: u64,

    #[serde(with = "ts_milliseconds")]
    pub last_accessed_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    #[serde(default)]
    pub provider_metadata: ProviderMetadata,
}

/// A cached document: content plus metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub metadata: CacheMetadata,
    pub content: Vec<u8>,
}

impl CacheEntry {
    /// Wrap a fetch result, expiring `ttl` after `now`
    pub fn new(uri: impl Into<String>, result: FetchResult, ttl: Duration, now: DateTime<Utc>) -> Self {
        let FetchResult {
            content,
            content_type,
            source,
            mut metadata,
            ..
        } = result;

        let etag = take_string(&mut metadata, META_ETAG);
        let last_modified = take_string(&mut metadata, META_LAST_MODIFIED);
        let ttl_seconds = ttl.as_secs();

        Self {
            metadata: CacheMetadata {
                uri: uri.into(),
                cached_at: now,
                expires_at: offset(now, ttl),
                ttl_seconds,
                content_hash: content_hash(&content),
                size: content.len() as u64,
                content_type,
                source,
                access_count: 0,
                last_accessed_at: now,
                etag,
                last_modified,
                provider_metadata: metadata,
            },
            content,
        }
    }

    pub fn uri(&self) -> &str {
        &self.metadata.uri
    }

    pub fn size(&self) -> u64 {
        self.metadata.size
    }

    pub fn freshness(&self, now: DateTime<Utc>, stale_window: Duration) -> Freshness {
        self.metadata.freshness(now, stale_window)
    }

    /// Record a read
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.access_count += 1;
        if now > self.metadata.last_accessed_at {
            self.metadata.last_accessed_at = now;
        }
    }

    /// Whether the stored hash matches the content
    pub fn verify(&self) -> bool {
        self.metadata.content_hash == content_hash(&self.content)
    }

    /// The entry as a fetch result; validators are folded back into metadata
    pub fn to_fetch_result(&self) -> FetchResult {
        let mut metadata = self.metadata.provider_metadata.clone();
        if let Some(etag) = &self.metadata.etag {
            metadata.insert(META_ETAG.to_string(), etag.clone().into());
        }
        if let Some(last_modified) = &self.metadata.last_modified {
            metadata.insert(META_LAST_MODIFIED.to_string(), last_modified.clone().into());
        }

        FetchResult {
            content: self.content.clone(),
            content_type: self.metadata.content_type.clone(),
            size: self.metadata.size,
            source: self.metadata.source.clone(),
            metadata,
        }
    }
}

impl CacheMetadata {
    pub fn freshness(&self, now: DateTime<Utc>, stale_window: Duration) -> Freshness {
        let stale_until = offset(self.expires_at, stale_window);

        if now < self.expires_at {
            Freshness::Fresh
        } else if now < stale_until {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Time left before expiry, `None` once expired
    pub fn time_until_expiration(&self, now: DateTime<Utc>) -> Option<Duration> {
        (self.expires_at - now).to_std().ok()
    }
}

/// `at + by`, saturating at the latest representable instant
fn offset(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(by)
        .ok()
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn take_string(metadata: &mut ProviderMetadata, key: &str) -> Option<String> {
    match metadata.remove(key) {
        Some(value) => value.as_str().map(str::to_string),
        None => None,
    }
}

/// 32-bit rolling hash (`h = h * 31 + byte`), as 8 lowercase hex digits.
/// Detects changed content; not collision resistant.
pub fn content_hash(content: &[u8]) -> String {
    let hash = content
        .iter()
        .fold(0u32, |h, &b| h.wrapping_mul(31).wrapping_add(b as u32));
    format!("{:08x}", hash)
}
