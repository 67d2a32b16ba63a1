//! ノード管理APIハンドラー
//!
//! 登録・削除・参照・ハートビート

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use claw_mesh_common::{
    error::CoordinatorError,
    protocol::{HeartbeatRequest, RegisterRequest, RegisterResponse},
    types::{Node, NodeStatus},
};
use tracing::info;

use super::AppError;
use crate::{endpoint::validate_endpoint, id, AppState};

/// POST /api/v1/nodes/register - ノード登録
pub async fn register_node(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = payload
        .map_err(|_| CoordinatorError::Validation("invalid request body".to_string()))?;

    if req.name.is_empty() || req.endpoint.is_empty() {
        return Err(CoordinatorError::Validation(
            "name and endpoint are required".to_string(),
        )
        .into());
    }

    validate_endpoint(&req.endpoint, state.config.allow_private).await?;

    // ID衝突は再試行で回避する
    let mut node_id = None;
    for _ in 0..id::MAX_ID_RETRIES {
        let candidate = id::generate_id();
        if !state.registry.exists(&candidate).await {
            node_id = Some(candidate);
            break;
        }
    }
    let node_id = node_id.ok_or_else(|| {
        CoordinatorError::Internal("failed to generate unique node ID".to_string())
    })?;

    let token = id::generate_token();
    let now = Utc::now();
    let node = Node {
        id: node_id.clone(),
        name: req.name,
        endpoint: req.endpoint,
        capabilities: req.capabilities,
        status: NodeStatus::Online,
        last_heartbeat: now,
        registered_at: now,
    };

    state.registry.add(node.clone()).await?;
    state.registry.set_node_token(&node.id, &token).await;

    info!(
        node_id = %node.id,
        name = %node.name,
        endpoint = %node.endpoint,
        "node registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            node_id,
            token,
        }),
    ))
}

/// DELETE /api/v1/nodes/{id} - ノード削除
pub async fn deregister_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state.registry.remove(&node_id).await {
        return Err(CoordinatorError::NodeNotFound.into());
    }
    info!(node_id = %node_id, "node deregistered");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/nodes - ノード一覧
pub async fn list_nodes(State(state): State<AppState>) -> Json<Vec<Node>> {
    Json(state.registry.list().await)
}

/// GET /api/v1/nodes/{id} - ノード取得
pub async fn get_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<Node>, AppError> {
    state
        .registry
        .get(&node_id)
        .await
        .map(Json)
        .ok_or_else(|| CoordinatorError::NodeNotFound.into())
}

/// POST /api/v1/nodes/{id}/heartbeat - ハートビート
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    // 不正なステータス値はデコード段階で弾かれる
    let Json(req) = payload
        .map_err(|_| CoordinatorError::Validation("invalid request body".to_string()))?;

    if !state.registry.record_heartbeat(&node_id, req.status).await {
        return Err(CoordinatorError::NodeNotFound.into());
    }
    Ok(StatusCode::NO_CONTENT)
}
