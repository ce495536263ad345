//! Core type definitions for the cache system

use crate::cache::entry::Freshness;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache statistics: disk-derived counts overlaid with live memory figures
/// and runtime counters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries on disk
    pub entry_count: usize,

    /// Content bytes on disk
    pub total_size: u64,

    pub fresh_count: usize,
    pub stale_count: usize,
    pub expired_count: usize,

    /// Entries currently held in memory
    pub memory_entries: usize,

    /// Content bytes currently held in memory
    pub memory_size: u64,

    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,

    pub refreshes_started: u64,
    pub refreshes_failed: u64,

    /// Memory evictions due to the entry-count limit
    pub evictions_count: u64,

    /// Memory evictions due to the byte limit
    pub evictions_size: u64,

    pub invalidations: u64,
}

impl CacheStats {
    /// Cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.disk_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn total_evictions(&self) -> u64 {
        self.evictions_count + self.evictions_size
    }

    /// Record an entry found on disk in the freshness buckets
    pub fn record_disk_entry(&mut self, size: u64, freshness: Freshness) {
        self.entry_count += 1;
        self.total_size += size;
        match freshness {
            Freshness::Fresh => self.fresh_count += 1,
            Freshness::Stale => self.stale_count += 1,
            Freshness::Expired => self.expired_count += 1,
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CacheStats {{ entries: {} ({} fresh, {} stale, {} expired), size: {} bytes, memory: {} entries / {} bytes, hit_rate: {:.2}%, evictions: {} }}",
            self.entry_count,
            self.fresh_count,
            self.stale_count,
            self.expired_count,
            self.total_size,
            self.memory_entries,
            self.memory_size,
            self.hit_rate(),
            self.total_evictions()
        )
    }
}

/// Where a cached entry was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLayer {
    Memory,
    Disk,
}

impl fmt::Display for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheLayer::Memory => write!(f, "memory"),
            CacheLayer::Disk => write!(f, "disk"),
        }
    }
}

/// Result of a non-mutating cache probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheLookup {
    pub hit: bool,
    pub freshness: Option<Freshness>,
    pub source: Option<CacheLayer>,
}

impl CacheLookup {
    pub fn miss() -> Self {
        Self {
            hit: false,
            freshness: None,
            source: None,
        }
    }

    pub fn hit(freshness: Freshness, source: CacheLayer) -> Self {
        Self {
            hit: true,
            freshness: Some(freshness),
            source: Some(source),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.freshness == Some(Freshness::Fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            memory_hits: 60,
            disk_hits: 20,
            misses: 20,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 80.0);
    }

    #[test]
    fn test_cache_stats_zero_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_record_disk_entry() {
        let mut stats = CacheStats::default();
        stats.record_disk_entry(10, Freshness::Fresh);
        stats.record_disk_entry(5, Freshness::Stale);
        stats.record_disk_entry(1, Freshness::Expired);

        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.total_size, 16);
        assert_eq!(
            (stats.fresh_count, stats.stale_count, stats.expired_count),
            (1, 1, 1)
        );
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            entry_count: 4,
            fresh_count: 3,
            expired_count: 1,
            total_size: 1024,
            ..Default::default()
        };
        let display = format!("{}", stats);
        assert!(display.contains("entries: 4 (3 fresh, 0 stale, 1 expired)"));
        assert!(display.contains("size: 1024 bytes"));
    }

    #[test]
    fn test_cache_lookup() {
        let lookup = CacheLookup::hit(Freshness::Fresh, CacheLayer::Disk);
        assert!(lookup.hit && lookup.is_fresh());
        assert!(!CacheLookup::miss().is_fresh());
        assert_eq!(format!("{}", CacheLayer::Memory), "memory");
    }
}
