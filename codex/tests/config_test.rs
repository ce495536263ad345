//! Integration tests for config discovery and loading

use codex::config::{find_config_file, load_options, ConfigFile, DEFAULT_CACHE_DIR};
use codex_cache::{CodexOptions, ProviderKind};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

const SAMPLE: &str = r#"
organization: acme
project: handbook
cache:
  dir: var/codex-cache
  default_ttl: 2h
  stale_window: 600
  max_memory_entries: 250
  stale_while_revalidate: false
storage:
  providers: [vcs, http]
  default_branch: develop
  github:
    timeout: 10s
  http:
    base_url: https://docs.example.com
    headers:
      x-api-key: abc
types:
  - name: runbooks
    patterns: ["runbooks/**"]
    ttl: 15m
    priority: 60
"#;

fn write_config(root: &Path, text: &str) {
    let dir = root.join(".fractary/codex");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("config.yaml"), text).unwrap();
}

#[test]
fn test_apply_full_config() {
    let config = ConfigFile::parse(SAMPLE).unwrap();
    let mut options = CodexOptions::default();
    config.apply(&mut options, Path::new("/work/repo")).unwrap();

    assert_eq!(options.org.as_deref(), Some("acme"));
    assert_eq!(options.project.as_deref(), Some("handbook"));
    assert_eq!(options.cache_dir, Path::new("/work/repo/var/codex-cache"));
    assert_eq!(options.default_ttl_secs, 7_200);
    assert_eq!(options.stale_window_secs, 600);
    assert_eq!(options.max_memory_entries, 250);
    assert!(!options.stale_while_revalidate);
    assert_eq!(options.providers, vec![ProviderKind::Github, ProviderKind::Http]);
    assert_eq!(options.default_branch, "develop");
    assert_eq!(options.github_timeout_ms, 10_000);
    assert_eq!(options.http_base_url, "https://docs.example.com");
    assert_eq!(options.http_headers.get("x-api-key").map(String::as_str), Some("abc"));

    let registry = options.type_registry().unwrap().unwrap();
    assert_eq!(
        registry.ttl_for("runbooks/deploy.md"),
        Some(Duration::from_secs(900))
    );
}

#[test]
fn test_invalid_config_is_rejected() {
    assert!(ConfigFile::parse("cache: 42").is_err());

    let config = ConfigFile::parse("cache:\n  default_ttl: whenever\n").unwrap();
    let mut options = CodexOptions::default();
    assert!(config.apply(&mut options, Path::new(".")).is_err());
}

#[test]
fn test_find_config_walks_up() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), "organization: acme\n");
    let nested = temp.path().join("docs/guides");
    fs::create_dir_all(&nested).unwrap();

    let (path, root) = find_config_file(&nested).unwrap();
    assert_eq!(path, temp.path().join(".fractary/codex/config.yaml"));
    assert_eq!(root, temp.path());
}

#[test]
fn test_load_options_roots_cache_at_project() {
    let temp = TempDir::new().unwrap();
    write_config(temp.path(), "organization: acme\nproject: handbook\n");
    let nested = temp.path().join("src");
    fs::create_dir_all(&nested).unwrap();

    let options = load_options(&nested, None).unwrap();
    assert_eq!(options.base_dir, nested);
    assert_eq!(options.cache_dir, temp.path().join(DEFAULT_CACHE_DIR));
    assert_eq!(options.project.as_deref(), Some("handbook"));
}

#[test]
fn test_load_options_explicit_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("codex.yaml");
    fs::write(&path, SAMPLE).unwrap();

    let options = load_options(temp.path(), Some(&path)).unwrap();
    assert_eq!(options.cache_dir, temp.path().join("var/codex-cache"));
    assert_eq!(options.default_branch, "develop");

    let missing = temp.path().join("missing.yaml");
    assert!(load_options(temp.path(), Some(&missing)).is_err());
}
