//! Link management API integration tests

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use tracelink::analytics::NoopLocator;
use tracelink::app::App;
use tracelink::config::{AuthConfig, AuthMode, Config};
use tracelink::storage::MemoryStorage;

fn api_router(config: &Config) -> Router {
    App::new(config, Arc::new(MemoryStorage::new()), Arc::new(NoopLocator)).api_router
}

fn open_config() -> Config {
    Config {
        redirect_base_url: "https://t.example".to_string(),
        ..Default::default()
    }
}

fn api_key_config() -> Config {
    Config {
        auth: AuthConfig {
            mode: AuthMode::ApiKey,
            api_keys: vec![
                ("alice".to_string(), "alice-key".to_string()),
                ("bob".to_string(), "bob-key".to_string()),
            ],
        },
        ..open_config()
    }
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    api_key: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_create_link() {
    let api = api_router(&open_config());

    let (status, body) = send(
        &api,
        "POST",
        "/links",
        None,
        Some(json!({"url": "  https://example.com/spring-sale  ", "title": "Spring sale", "expiryDays": 30})),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let code = body["code"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(body["original_url"], "https://example.com/spring-sale");
    assert_eq!(body["title"], "Spring sale");
    assert_eq!(
        body["tracking_url"],
        format!("https://t.example/track/{code}")
    );
    let created_at = body["created_at"].as_i64().unwrap();
    assert_eq!(body["expires_at"].as_i64().unwrap(), created_at + 30 * 86_400);
}

#[tokio::test]
async fn test_create_rejects_invalid_urls() {
    let api = api_router(&open_config());

    for url in [
        "",
        "not a url",
        "ftp://example.com/file",
        "javascript:alert(1)",
        "https://example.com/a\nb",
        "https://exa\tmple.com/",
    ] {
        let (status, body) = send(&api, "POST", "/links", None, Some(json!({ "url": url }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "url {url:?} was accepted");
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    let (_, links) = send(&api, "GET", "/links", None, None).await;
    assert_eq!(links.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_get_link_and_unknown_code() {
    let api = api_router(&open_config());
    let (_, created) = send(
        &api,
        "POST",
        "/links",
        None,
        Some(json!({"url": "https://example.com"})),
    )
    .await;
    let code = created["code"].as_str().unwrap();

    let (status, body) = send(&api, "GET", &format!("/links/{code}"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["original_url"], "https://example.com");

    let (status, _) = send(&api, "GET", "/links/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&api, "GET", "/links/nope/stats", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_links_newest_first_with_clicks() {
    let api = api_router(&open_config());
    for i in 0..3 {
        send(
            &api,
            "POST",
            "/links",
            None,
            Some(json!({"url": format!("https://example.com/{i}"), "owner": "team-a"})),
        )
        .await;
    }
    send(
        &api,
        "POST",
        "/links",
        None,
        Some(json!({"url": "https://example.com/other", "owner": "team-b"})),
    )
    .await;

    let (status, links) = send(&api, "GET", "/links?owner=team-a", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let links = links.as_array().unwrap();
    assert_eq!(links.len(), 3);
    assert_eq!(links[0]["original_url"], "https://example.com/2");
    assert_eq!(links[2]["original_url"], "https://example.com/0");
    assert!(links.iter().all(|l| l["clicks"] == 0));

    let (_, page) = send(&api, "GET", "/links?limit=2&offset=2", None, None).await;
    assert_eq!(page.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_global_stats_and_activity_start_empty() {
    let api = api_router(&open_config());

    let (status, stats) = send(&api, "GET", "/stats", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stats,
        json!({"total_links": 0, "total_visits": 0, "unique_locations": 0})
    );

    let (status, activity) = send(&api, "GET", "/activity?limit=5", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(activity, json!([]));
}

#[tokio::test]
async fn test_health_is_public() {
    let api = api_router(&api_key_config());
    let (status, body) = send(&api, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "OK");
}

#[tokio::test]
async fn test_api_key_required() {
    let api = api_router(&api_key_config());

    let (status, _) = send(&api, "GET", "/links", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&api, "GET", "/stats", Some("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&api, "GET", "/stats", Some("alice-key"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_authenticated_owner_scopes_links() {
    let api = api_router(&api_key_config());

    let (status, created) = send(
        &api,
        "POST",
        "/links",
        Some("alice-key"),
        Some(json!({"url": "https://example.com/a", "owner": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["owner"], "alice");

    send(
        &api,
        "POST",
        "/links",
        Some("bob-key"),
        Some(json!({"url": "https://example.com/b"})),
    )
    .await;

    let (_, alice_links) = send(&api, "GET", "/links", Some("alice-key"), None).await;
    let alice_links = alice_links.as_array().unwrap();
    assert_eq!(alice_links.len(), 1);
    assert_eq!(alice_links[0]["original_url"], "https://example.com/a");

    let (_, bob_links) = send(&api, "GET", "/links?owner=alice", Some("bob-key"), None).await;
    let bob_links = bob_links.as_array().unwrap();
    assert_eq!(bob_links.len(), 1);
    assert_eq!(bob_links[0]["owner"], "bob");
}
