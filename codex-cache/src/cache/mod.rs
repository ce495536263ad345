//! # Document Cache
//!
//! Two-tier cache for fetched knowledge documents.
//!
//! ## Features
//!
//! - **TTL with a stale window**: entries are fresh until `expires_at`, stale
//!   for `stale_window` after that, then expired
//! - **Stale-while-revalidate**: stale entries are served immediately while
//!   a single background refresh per URI replaces them
//! - **LRU memory index**: bounded by entry count and total bytes; eviction
//!   never removes the on-disk copy
//! - **Durable entries**: content plus a JSON sidecar per URI, written
//!   atomically and verified by content hash on load
//!
//! ## Example
//!
//! ```rust,no_run
//! use codex_cache::cache::{CacheConfig, CacheManager, GetOptions};
//! use codex_cache::reference::{ReferenceResolver, ResolverConfig};
//! use codex_cache::storage::{StorageConfig, StorageManager};
//! use std::time::Duration;
//!
//! # async fn example() -> codex_cache::Result<()> {
//! let config = CacheConfig::builder()
//!     .cache_dir(".fractary/codex/cache")
//!     .default_ttl(Duration::from_secs(3600))
//!     .build();
//!
//! let cache = CacheManager::new(config, StorageManager::new(StorageConfig::default())?);
//! let resolver = ReferenceResolver::new(ResolverConfig::default());
//!
//! if let Some(reference) = resolver.resolve("codex://acme/handbook/docs/onboarding.md") {
//!     let doc = cache.get(&reference, &GetOptions::default()).await?;
//!     println!("{}", doc.text());
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod entry;
pub mod invalidation;
pub mod manager;
pub mod persistence;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheConfigBuilder, MAX_TTL};
pub use entry::{content_hash, CacheEntry, CacheMetadata, Freshness};
pub use invalidation::{InvalidationReason, UriPattern};
pub use manager::{CacheManager, GetOptions};
pub use persistence::{CachePersistence, EntryPaths};
pub use types::{CacheLayer, CacheLookup, CacheStats};
