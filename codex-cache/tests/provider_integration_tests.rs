//! Remote providers against an in-process HTTP server

mod common;

use axum::http::StatusCode;
use codex_cache::cache::{CacheConfig, CacheManager, GetOptions};
use codex_cache::storage::{GitHubConfig, GitHubProvider, HttpConfig, HttpProvider};
use codex_cache::{
    CodexError, FetchOptions, Reference, ReferenceResolver, ResolverConfig, StorageManager,
    StorageProvider,
};
use common::{FileServer, Route};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

const RAW_PATH: &str = "/acme/handbook/main/docs/a.md";
const API_PATH: &str = "/repos/acme/handbook/contents/docs/a.md";

fn reference(uri: &str) -> Reference {
    ReferenceResolver::new(ResolverConfig {
        detect_from_git: false,
        ..Default::default()
    })
    .resolve(uri)
    .unwrap()
}

fn doc() -> Reference {
    reference("codex://acme/handbook/docs/a.md")
}

fn http_provider(server: &FileServer) -> HttpProvider {
    HttpProvider::new(HttpConfig {
        base_url: server.base_url.clone(),
        ..Default::default()
    })
    .unwrap()
}

fn github_provider(server: &FileServer, token: Option<&str>) -> GitHubProvider {
    GitHubProvider::new(GitHubConfig {
        token: token.map(str::to_string),
        raw_base_url: server.base_url.clone(),
        api_base_url: server.base_url.clone(),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_http_fetch_captures_validators() {
    let server = FileServer::start().await;
    server.route(
        RAW_PATH,
        Route::ok("# Guide")
            .with_header("content-type", "text/markdown; charset=utf-8")
            .with_header("etag", "\"abc123\"")
            .with_header("last-modified", "Tue, 01 Oct 2024 10:00:00 GMT"),
    );

    let result = http_provider(&server)
        .fetch(&doc(), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.text(), "# Guide");
    assert_eq!(result.size, 7);
    assert_eq!(result.content_type, "text/markdown");
    assert_eq!(result.metadata_str("etag"), Some("\"abc123\""));
    assert_eq!(
        result.metadata_str("lastModified"),
        Some("Tue, 01 Oct 2024 10:00:00 GMT")
    );
    assert_eq!(result.source, format!("{}{}", server.base_url, RAW_PATH));
}

#[tokio::test]
async fn test_http_status_mapping() {
    let server = FileServer::start().await;
    server.route(RAW_PATH, Route::status(StatusCode::INTERNAL_SERVER_ERROR));
    let provider = http_provider(&server);

    let err = provider.fetch(&doc(), &FetchOptions::default()).await.unwrap_err();
    assert!(matches!(err, CodexError::Transport(_)));

    let missing = reference("codex://acme/handbook/docs/missing.md");
    let err = provider.fetch(&missing, &FetchOptions::default()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_http_size_ceiling() {
    let server = FileServer::start().await;
    server.serve(RAW_PATH, "0123456789");

    let options = FetchOptions {
        max_size: Some(4),
        ..Default::default()
    };
    let err = http_provider(&server).fetch(&doc(), &options).await.unwrap_err();
    assert!(matches!(err, CodexError::TooLarge { max_size: 4, .. }));
}

#[tokio::test]
async fn test_http_headers_branch_and_exists() {
    let server = FileServer::start().await;
    server.serve("/acme/handbook/v2/docs/a.md", "v2 docs");

    let mut headers = BTreeMap::new();
    headers.insert("authorization".to_string(), "Token s3cret".to_string());
    let provider = HttpProvider::new(HttpConfig {
        base_url: server.base_url.clone(),
        headers,
        ..Default::default()
    })
    .unwrap();

    let v2 = FetchOptions::default().with_branch("v2");
    let result = provider.fetch(&doc(), &v2).await.unwrap();
    assert_eq!(result.text(), "v2 docs");

    let requests = server.requests();
    assert_eq!(requests[0].authorization.as_deref(), Some("Token s3cret"));

    assert!(provider.exists(&doc(), &v2).await);
    assert!(!provider.exists(&doc(), &FetchOptions::default()).await);
}

#[tokio::test]
async fn test_github_raw_fetch() {
    let server = FileServer::start().await;
    server.serve(RAW_PATH, "raw body");

    let result = github_provider(&server, Some("t0k"))
        .fetch(&doc(), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.text(), "raw body");
    assert_eq!(result.source, "github");
    assert_eq!(result.content_type, "text/markdown");
    assert_eq!(result.metadata_str("method"), Some("raw"));
    assert_eq!(server.hits(API_PATH), 0);
}

#[tokio::test]
async fn test_github_api_fallback_with_token() {
    let server = FileServer::start().await;
    server.route(RAW_PATH, Route::status(StatusCode::SERVICE_UNAVAILABLE));
    server.route(
        API_PATH,
        Route::ok(
            json!({
                "type": "file",
                "content": "aGVs\nbG8g\nd29y\nbGQ=\n",
                "sha": "5e1c309d",
                "download_url": null
            })
            .to_string(),
        ),
    );

    let result = github_provider(&server, Some("t0k"))
        .fetch(&doc(), &FetchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.text(), "hello world");
    assert_eq!(result.metadata_str("method"), Some("api"));
    assert_eq!(result.metadata_str("etag"), Some("\"5e1c309d\""));

    let api_request = server
        .requests()
        .into_iter()
        .find(|r| r.path == API_PATH)
        .unwrap();
    assert_eq!(api_request.authorization.as_deref(), Some("Bearer t0k"));
    assert_eq!(api_request.query.as_deref(), Some("ref=main"));
}

#[tokio::test]
async fn test_github_api_directory_is_not_found() {
    let server = FileServer::start().await;
    server.route(
        API_PATH,
        Route::ok(json!({"type": "dir", "sha": "d1"}).to_string()),
    );

    let err = github_provider(&server, Some("t0k"))
        .fetch(&doc(), &FetchOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_github_without_token_reports_raw_error() {
    let server = FileServer::start().await;
    server.route(RAW_PATH, Route::status(StatusCode::BAD_GATEWAY));

    let err = github_provider(&server, None)
        .fetch(&doc(), &FetchOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, CodexError::Transport(_)));
    assert_eq!(server.hits(API_PATH), 0);
}

#[tokio::test]
async fn test_github_too_large_is_not_retried() {
    let server = FileServer::start().await;
    server.serve(RAW_PATH, "0123456789");

    let options = FetchOptions {
        max_size: Some(4),
        ..Default::default()
    };
    let err = github_provider(&server, Some("t0k"))
        .fetch(&doc(), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, CodexError::TooLarge { .. }));
    assert_eq!(server.hits(API_PATH), 0);
}

#[tokio::test]
async fn test_cached_entry_keeps_validators() {
    let server = FileServer::start().await;
    server.route(RAW_PATH, Route::ok("cached").with_header("etag", "W/\"v1\""));

    let temp = TempDir::new().unwrap();
    let storage = StorageManager::with_providers(vec![
        Arc::new(http_provider(&server)) as Arc<dyn StorageProvider>
    ]);
    let cache = CacheManager::new(
        CacheConfig::builder().cache_dir(temp.path()).build(),
        storage,
    );

    cache.get(&doc(), &GetOptions::default()).await.unwrap();
    let again = cache.get(&doc(), &GetOptions::default()).await.unwrap();
    assert_eq!(again.metadata_str("etag"), Some("W/\"v1\""));
    assert_eq!(server.hits(RAW_PATH), 1);

    let stored = cache
        .persistence()
        .read_metadata("codex://acme/handbook/docs/a.md")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.etag.as_deref(), Some("W/\"v1\""));
}
