//! Integration Test: ノードライフサイクル
//!
//! 登録 → 参照 → ハートビート → 登録解除

use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::support::app::{
    linux_capabilities, register_node, send_heartbeat, spawn_coordinator,
    spawn_coordinator_with,
};

#[tokio::test]
async fn test_register_assigns_id_and_token() {
    let coordinator = spawn_coordinator("admin-token").await;

    let (node_id, token) = register_node(
        &coordinator,
        "worker-1",
        "127.0.0.1:9121",
        linux_capabilities(true),
    )
    .await;

    // ID形式: "node-" + 16桁hex、トークン: 32桁hex
    assert!(node_id.starts_with("node-"));
    assert_eq!(node_id.len(), "node-".len() + 16);
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_register_validation_errors() {
    let coordinator = spawn_coordinator("admin-token").await;
    let client = Client::new();

    // nameとendpointは必須
    let response = client
        .post(format!("{}/api/v1/nodes/register", coordinator.url()))
        .bearer_auth(&coordinator.admin_token)
        .json(&json!({"name": "", "endpoint": "", "capabilities": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "name and endpoint are required");

    // URL風のエンドポイントは拒否
    let response = client
        .post(format!("{}/api/v1/nodes/register", coordinator.url()))
        .bearer_auth(&coordinator.admin_token)
        .json(&json!({
            "name": "worker",
            "endpoint": "http://example.com:80/path",
            "capabilities": {}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 未知フィールドは拒否
    let response = client
        .post(format!("{}/api/v1/nodes/register", coordinator.url()))
        .bearer_auth(&coordinator.admin_token)
        .json(&json!({
            "name": "worker",
            "endpoint": "127.0.0.1:9121",
            "capabilities": {},
            "surprise": true
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_register_rejects_private_endpoint_by_default() {
    let coordinator = spawn_coordinator_with("admin-token", false).await;

    let response = Client::new()
        .post(format!("{}/api/v1/nodes/register", coordinator.url()))
        .bearer_auth(&coordinator.admin_token)
        .json(&json!({
            "name": "worker",
            "endpoint": "192.168.1.5:9121",
            "capabilities": {}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("private/loopback"));

    coordinator.stop().await;
}

#[tokio::test]
async fn test_list_and_get_round_trip() {
    let coordinator = spawn_coordinator("admin-token").await;
    let (node_id, _token) = register_node(
        &coordinator,
        "worker-1",
        "127.0.0.1:9121",
        linux_capabilities(false),
    )
    .await;

    // 一覧に登録時のエンドポイントがそのまま現れる
    let nodes: Vec<serde_json::Value> = Client::new()
        .get(format!("{}/api/v1/nodes", coordinator.url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0]["endpoint"], "127.0.0.1:9121");
    assert_eq!(nodes[0]["status"], "online");

    let node: serde_json::Value = Client::new()
        .get(format!("{}/api/v1/nodes/{}", coordinator.url(), node_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(node["id"], node_id.as_str());

    let response = Client::new()
        .get(format!("{}/api/v1/nodes/node-ffffffffffffffff", coordinator.url()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_heartbeat_updates_status() {
    let coordinator = spawn_coordinator("admin-token").await;
    let (node_id, token) = register_node(
        &coordinator,
        "worker-1",
        "127.0.0.1:9121",
        linux_capabilities(false),
    )
    .await;

    let response = send_heartbeat(&coordinator, &node_id, &token, "busy").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let node = coordinator.state.registry.get(&node_id).await.unwrap();
    assert_eq!(node.status.to_string(), "busy");

    // 不正なステータス値は400
    let response = send_heartbeat(&coordinator, &node_id, &token, "hibernating").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // 未登録ノードは404
    let response =
        send_heartbeat(&coordinator, "node-ffffffffffffffff", &coordinator.admin_token, "online")
            .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_deregister_removes_node_and_invalidates_token() {
    let coordinator = spawn_coordinator("admin-token").await;
    let (node_id, token) = register_node(
        &coordinator,
        "worker-1",
        "127.0.0.1:9121",
        linux_capabilities(false),
    )
    .await;

    let response = Client::new()
        .delete(format!("{}/api/v1/nodes/{}", coordinator.url(), node_id))
        .bearer_auth(&coordinator.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // 二度目は404
    let response = Client::new()
        .delete(format!("{}/api/v1/nodes/{}", coordinator.url(), node_id))
        .bearer_auth(&coordinator.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // 削除されたノードのトークンは認証に使えない
    let response = send_heartbeat(&coordinator, &node_id, &token, "online").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    coordinator.stop().await;
}
