//! Integration Test: エンドツーエンドのルーティングシナリオ
//!
//! wiremockをノードエンドポイントに見立て、ルーティングと転送を検証する

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use claw_mesh_coordinator::health::HealthChecker;
use reqwest::{Client, StatusCode};
use serde_json::json;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::support::app::{
    endpoint_of, linux_capabilities, register_node, route_message, send_heartbeat,
    spawn_coordinator,
};

/// ノード側ハンドラーを模したモックを用意する
async fn mock_node_endpoint(server: &MockServer, response_text: &str) {
    let text = response_text.to_string();
    Mock::given(method("POST"))
        .and(path("/api/v1/messages"))
        .respond_with(move |req: &wiremock::Request| {
            let msg: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or_default();
            ResponseTemplate::new(200).set_body_json(json!({
                "message_id": msg["id"],
                "node_id": "",
                "response": text.clone(),
            }))
        })
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_scenario_explicit_pin_to_offline_node() {
    let coordinator = spawn_coordinator("admin-token").await;
    let node_a = MockServer::start().await;
    let node_b = MockServer::start().await;

    let (id_a, token_a) = register_node(
        &coordinator,
        "A",
        &endpoint_of(&node_a.uri()),
        linux_capabilities(false),
    )
    .await;
    let (_id_b, _token_b) = register_node(
        &coordinator,
        "B",
        &endpoint_of(&node_b.uri()),
        linux_capabilities(false),
    )
    .await;

    // Aをオフラインにする
    let response = send_heartbeat(&coordinator, &id_a, &token_a, "offline").await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = route_message(&coordinator, Some(&id_a), "hi").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = response.text().await.unwrap();
    assert!(
        body.contains(&format!(r#"target node "{id_a}" is offline"#)),
        "body: {body}"
    );

    coordinator.stop().await;
}

#[tokio::test]
async fn test_scenario_auto_route_forwards_with_node_token() {
    let coordinator = spawn_coordinator("admin-token").await;
    let node_a = MockServer::start().await;

    let (id_a, token_a) = register_node(
        &coordinator,
        "A",
        &endpoint_of(&node_a.uri()),
        linux_capabilities(false),
    )
    .await;
    mock_node_endpoint(&node_a, "handled by A").await;

    let response = route_message(&coordinator, None, "hi").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["node_id"], id_a.as_str());
    assert_eq!(body["response"], "handled by A");
    assert!(body["message_id"].as_str().unwrap().starts_with("node-"));

    // 転送されたリクエストはノードトークンと元のcontentを運ぶ
    let requests = node_a.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let auth = requests[0]
        .headers
        .get("Authorization")
        .expect("auth header")
        .to_str()
        .unwrap();
    assert_eq!(auth, format!("Bearer {token_a}"));
    let forwarded: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(forwarded["content"], "hi");

    coordinator.stop().await;
}

#[tokio::test]
async fn test_scenario_wildcard_least_busy_selection() {
    let coordinator = spawn_coordinator("admin-token").await;
    let node_a = MockServer::start().await;
    let node_b = MockServer::start().await;

    let (id_a, token_a) = register_node(
        &coordinator,
        "A",
        &endpoint_of(&node_a.uri()),
        linux_capabilities(false),
    )
    .await;
    let (id_b, token_b) = register_node(
        &coordinator,
        "B",
        &endpoint_of(&node_b.uri()),
        linux_capabilities(false),
    )
    .await;
    mock_node_endpoint(&node_a, "from A").await;
    mock_node_endpoint(&node_b, "from B").await;

    // Aはbusy、Bはonline
    send_heartbeat(&coordinator, &id_a, &token_a, "busy").await;

    let response = Client::new()
        .post(format!("{}/api/v1/rules", coordinator.url()))
        .bearer_auth(&coordinator.admin_token)
        .json(&json!({"match": {"wildcard": true}, "strategy": "least-busy"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = route_message(&coordinator, None, "hi").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["node_id"], id_b.as_str());

    // Bがオフラインになれば選択はAに移る
    send_heartbeat(&coordinator, &id_b, &token_b, "offline").await;
    let response = route_message(&coordinator, None, "hi").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["node_id"], id_a.as_str());

    coordinator.stop().await;
}

#[tokio::test]
async fn test_scenario_rule_target_miss_falls_back_to_default() {
    let coordinator = spawn_coordinator("admin-token").await;
    let node_a = MockServer::start().await;
    let node_b = MockServer::start().await;

    let (id_a, _token_a) = register_node(
        &coordinator,
        "A",
        &endpoint_of(&node_a.uri()),
        linux_capabilities(false),
    )
    .await;
    let mut mac_caps = linux_capabilities(false);
    mac_caps["os"] = json!("darwin");
    let (_id_b, _token_b) =
        register_node(&coordinator, "B", &endpoint_of(&node_b.uri()), mac_caps).await;
    mock_node_endpoint(&node_a, "from A").await;
    mock_node_endpoint(&node_b, "from B").await;

    // linuxにマッチするがターゲットCは存在しない → ルールは飛ばされ
    // オンライン全体のleast-busyでA（先に登録）が選ばれる
    let response = Client::new()
        .post(format!("{}/api/v1/rules", coordinator.url()))
        .bearer_auth(&coordinator.admin_token)
        .json(&json!({"match": {"requires_os": "linux"}, "target": "C"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = route_message(&coordinator, None, "x").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["node_id"], id_a.as_str());

    coordinator.stop().await;
}

#[tokio::test]
async fn test_scenario_forwarder_retries_transient_failures() {
    let coordinator = spawn_coordinator("admin-token").await;
    let node_a = MockServer::start().await;

    register_node(
        &coordinator,
        "A",
        &endpoint_of(&node_a.uri()),
        linux_capabilities(false),
    )
    .await;

    // 2回503を返してから成功する
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);
    Mock::given(method("POST"))
        .and(path("/api/v1/messages"))
        .respond_with(move |req: &wiremock::Request| {
            let count = calls_clone.fetch_add(1, Ordering::SeqCst) + 1;
            if count < 3 {
                ResponseTemplate::new(503)
            } else {
                let msg: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or_default();
                ResponseTemplate::new(200).set_body_json(json!({
                    "message_id": msg["id"],
                    "node_id": "",
                    "response": "recovered",
                }))
            }
        })
        .mount(&node_a)
        .await;

    let start = Instant::now();
    let response = route_message(&coordinator, None, "hi").await;
    let elapsed = start.elapsed();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(elapsed >= Duration::from_millis(300), "elapsed: {elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "elapsed: {elapsed:?}");

    coordinator.stop().await;
}

#[tokio::test]
async fn test_scenario_probe_failures_force_node_offline() {
    let coordinator = spawn_coordinator("admin-token").await;
    let node_a = MockServer::start().await;

    // ハートビートは新鮮なまま/healthzだけ落ちている状況
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&node_a)
        .await;

    let (id_a, _token_a) = register_node(
        &coordinator,
        "A",
        &endpoint_of(&node_a.uri()),
        linux_capabilities(false),
    )
    .await;

    let checker = HealthChecker::new(
        coordinator.state.registry.clone(),
        Duration::from_secs(60),
        Duration::from_millis(50),
    );
    checker.start().await;

    // 2回のプローブ失敗でオフラインになるまで待つ
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let node = coordinator.state.registry.get(&id_a).await.unwrap();
        if node.status == claw_mesh_common::types::NodeStatus::Offline {
            break;
        }
        assert!(Instant::now() < deadline, "node never went offline");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    checker.stop().await;

    let response = route_message(&coordinator, Some(&id_a), "hi").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_route_with_no_nodes_returns_503() {
    let coordinator = spawn_coordinator("admin-token").await;

    let response = route_message(&coordinator, None, "hi").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "no online nodes available");

    coordinator.stop().await;
}

#[tokio::test]
async fn test_route_to_unknown_node_returns_404() {
    let coordinator = spawn_coordinator("admin-token").await;

    let response = route_message(&coordinator, Some("node-ffffffffffffffff"), "hi").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    coordinator.stop().await;
}

#[tokio::test]
async fn test_route_requires_content() {
    let coordinator = spawn_coordinator("admin-token").await;

    let response = Client::new()
        .post(format!("{}/api/v1/route", coordinator.url()))
        .bearer_auth(&coordinator.admin_token)
        .json(&json!({"content": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "content is required");

    coordinator.stop().await;
}
