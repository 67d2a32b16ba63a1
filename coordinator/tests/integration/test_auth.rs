//! Integration Test: 認証
//!
//! 管理トークンとノードトークンの和集合照合

use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::support::app::{linux_capabilities, register_node, send_heartbeat, spawn_coordinator};

#[tokio::test]
async fn test_mutating_endpoints_require_bearer_token() {
    let coordinator = spawn_coordinator("admin-token").await;
    let client = Client::new();
    let register_url = format!("{}/api/v1/nodes/register", coordinator.url());
    let body = json!({"name": "w", "endpoint": "127.0.0.1:9121", "capabilities": {}});

    // ヘッダー無し
    let response = client.post(&register_url).json(&body).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: serde_json::Value = response.json().await.unwrap();
    assert_eq!(err["error"], "missing or invalid authorization header");

    // Bearer以外の形式
    let response = client
        .post(&register_url)
        .header("Authorization", "Token admin-token")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 不正なトークン
    let response = client
        .post(&register_url)
        .bearer_auth("wrong-token")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let err: serde_json::Value = response.json().await.unwrap();
    assert_eq!(err["error"], "invalid token");

    // 管理トークンは通る
    let response = client
        .post(&register_url)
        .bearer_auth("admin-token")
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_node_token_is_accepted_on_mutating_endpoints() {
    let coordinator = spawn_coordinator("admin-token").await;
    let (node_id, node_token) = register_node(
        &coordinator,
        "worker-1",
        "127.0.0.1:9121",
        linux_capabilities(false),
    )
    .await;

    // ノード自身のトークンでハートビートできる
    let response = send_heartbeat(&coordinator, &node_id, &node_token, "online").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_read_endpoints_are_unauthenticated() {
    let coordinator = spawn_coordinator("admin-token").await;
    let client = Client::new();

    let response = client
        .get(format!("{}/api/v1/nodes", coordinator.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .get(format!("{}/api/v1/rules", coordinator.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_empty_admin_token_disables_auth() {
    let coordinator = spawn_coordinator("").await;

    let response = Client::new()
        .post(format!("{}/api/v1/nodes/register", coordinator.url()))
        .json(&json!({"name": "w", "endpoint": "127.0.0.1:9121", "capabilities": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_dashboard_injects_admin_token() {
    let coordinator = spawn_coordinator("admin-token").await;

    let html = Client::new()
        .get(format!("{}/", coordinator.url()))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(html.contains(r#"window.__TOKEN__ = "admin-token""#));

    coordinator.stop().await;
}
