//! # Codex Cache (codex-cache)
//!
//! Retrieval and caching of versioned knowledge documents addressed by
//! `codex://org/project/path` references.
//!
//! ## Features
//!
//! - Strict reference grammar with path-traversal rejection
//! - Current-project detection from the git `origin` remote
//! - Provider chain (local working tree, GitHub, plain HTTP) with fallback
//! - Two-tier cache: LRU memory index over durable, hash-verified disk entries
//! - Fresh / stale / expired lifecycle with stale-while-revalidate
//! - Per-artifact-type TTLs
//!
//! ## Fetching a Document
//!
//! ```no_run
//! use codex_cache::{CodexClient, CodexOptions, FetchRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CodexClient::new(&CodexOptions::default())?;
//!
//!     let doc = client
//!         .fetch("codex://acme/handbook/docs/onboarding.md", &FetchRequest::default())
//!         .await?;
//!     println!("{} bytes from {}", doc.size, doc.source);
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Resolving Without Fetching
//!
//! ```no_run
//! use codex_cache::{ReferenceResolver, ResolverConfig};
//!
//! let resolver = ReferenceResolver::new(ResolverConfig::default());
//! if let Some(reference) = resolver.resolve("codex://acme/handbook/specs/auth.md") {
//!     println!("cached at {}", reference.cache_path.display());
//!     println!("current project: {}", reference.is_current_project);
//! }
//! ```
//!
//! ## Cache Maintenance
//!
//! ```no_run
//! use codex_cache::{CodexClient, CodexOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CodexClient::new(&CodexOptions::default())?;
//!
//!     let removed = client.invalidate_pattern("codex://acme/handbook/docs/*").await?;
//!     println!("Invalidated {} entries", removed);
//!
//!     let stats = client.stats().await?;
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod error;
pub mod options;
pub mod reference;
pub mod storage;
pub mod ttl;

// Re-export main types for convenience
pub use cache::{
    CacheConfig, CacheConfigBuilder, CacheEntry, CacheLayer, CacheLookup, CacheManager,
    CacheMetadata, CacheStats, Clock, Freshness, GetOptions, InvalidationReason, ManualClock,
    SystemClock,
};
pub use client::{CodexClient, FetchRequest};
pub use error::{CodexError, ProviderFailure, Result};
pub use options::CodexOptions;
pub use reference::{
    build_uri, parse_uri, ParsedUri, ProjectIdentity, Reference, ReferenceResolver,
    ResolverConfig,
};
pub use storage::{
    FetchOptions, FetchResult, ProviderKind, StorageConfig, StorageManager, StorageProvider,
};
pub use ttl::{parse_ttl, ArtifactType, TypeRegistry};
