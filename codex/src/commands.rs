//! Command implementations and their terminal output

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use codex_cache::cache::{CacheMetadata, CacheStats, Freshness};
use codex_cache::{CodexClient, FetchRequest, Reference};
use serde::Serialize;
use std::io::Write;
use std::time::Duration;

/// What `cache clear` removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    All,
    Expired,
    Pattern(String),
}

pub async fn fetch(client: &CodexClient, uri: &str, request: &FetchRequest, json: bool) -> Result<()> {
    let result = client
        .fetch(uri, request)
        .await
        .with_context(|| format!("Failed to fetch {}", uri))?;

    let mut stdout = std::io::stdout().lock();
    if json {
        #[derive(Serialize)]
        struct FetchOutput<'a> {
            uri: &'a str,
            content_type: &'a str,
            size: u64,
            source: &'a str,
            content: String,
        }
        let output = FetchOutput {
            uri,
            content_type: &result.content_type,
            size: result.size,
            source: &result.source,
            content: result.text(),
        };
        writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
    } else {
        stdout.write_all(&result.content)?;
    }
    Ok(())
}

pub async fn exists(client: &CodexClient, uri: &str) -> Result<bool> {
    let found = client.exists(uri).await?;
    println!("{}", found);
    Ok(found)
}

pub fn resolve(client: &CodexClient, uri: &str, json: bool) -> Result<()> {
    let reference = client
        .resolve(uri)
        .with_context(|| format!("Invalid reference: {}", uri))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reference)?);
    } else {
        print!("{}", render_reference(&reference));
    }
    Ok(())
}

pub async fn list(client: &CodexClient, json: bool) -> Result<()> {
    let entries = client.list_cached().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("Cache is empty.");
    } else {
        print!("{}", render_entries(&entries, Utc::now(), client.cache().config().stale_window));
    }
    Ok(())
}

pub async fn stats(client: &CodexClient, json: bool) -> Result<()> {
    let stats = client.stats().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render_stats(&stats));
    }
    Ok(())
}

pub async fn clear(client: &CodexClient, scope: &ClearScope) -> Result<()> {
    let removed = match scope {
        ClearScope::All => client.clear().await?,
        ClearScope::Expired => client.clear_expired().await?,
        ClearScope::Pattern(pattern) => client.invalidate_pattern(pattern).await?,
    };
    println!("Removed {} entries", removed);
    Ok(())
}

pub fn render_reference(reference: &Reference) -> String {
    let mut out = String::new();
    out.push_str(&format!("URI:             {}\n", reference.uri));
    out.push_str(&format!("Organization:    {}\n", reference.org));
    out.push_str(&format!("Project:         {}\n", reference.project));
    out.push_str(&format!("Path:            {}\n", reference.path));
    out.push_str(&format!("Current project: {}\n", reference.is_current_project));
    out.push_str(&format!("Cache path:      {}\n", reference.cache_path.display()));
    if let Some(local) = &reference.local_path {
        out.push_str(&format!("Local path:      {}\n", local.display()));
    }
    out
}

/// One line per entry: freshness marker, size, age, URI
pub fn render_entries(entries: &[CacheMetadata], now: DateTime<Utc>, stale_window: Duration) -> String {
    let mut out = String::new();
    for entry in entries {
        let marker = match entry.freshness(now, stale_window) {
            Freshness::Fresh => "●",
            Freshness::Stale => "◐",
            Freshness::Expired => "○",
        };
        let expires = match entry.time_until_expiration(now) {
            Some(left) => format!("expires in {}s", left.as_secs()),
            None => "expired".to_string(),
        };
        out.push_str(&format!(
            "{} {:>10}  {:<18}  {}\n",
            marker,
            format_size(entry.size),
            expires,
            entry.uri
        ));
    }
    out.push_str(&format!("{} entries\n", entries.len()));
    out
}

pub fn render_stats(stats: &CacheStats) -> String {
    let mut out = String::new();
    out.push_str("Cache Statistics:\n");
    out.push_str(&format!("{}\n", "=".repeat(40)));
    out.push_str(&format!("  Entries:   {} ({})\n", stats.entry_count, format_size(stats.total_size)));
    out.push_str(&format!(
        "  Fresh:     {}  Stale: {}  Expired: {}\n",
        stats.fresh_count, stats.stale_count, stats.expired_count
    ));
    out.push_str(&format!(
        "  Memory:    {} entries ({})\n",
        stats.memory_entries,
        format_size(stats.memory_size)
    ));
    out.push_str(&format!("  Hit rate:  {:.1}%\n", stats.hit_rate()));
    out
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_render_stats() {
        let stats = CacheStats {
            entry_count: 3,
            total_size: 2048,
            fresh_count: 2,
            stale_count: 1,
            memory_hits: 2,
            disk_hits: 1,
            misses: 1,
            ..Default::default()
        };
        let text = render_stats(&stats);
        assert!(text.contains("Entries:   3 (2.0 KB)"));
        assert!(text.contains("Fresh:     2  Stale: 1  Expired: 0"));
        assert!(text.contains("Hit rate:  75.0%\n"));
    }
}
