//! ルーティングAPIハンドラー
//!
//! メッセージの自動ルーティングと明示的な宛先指定ルーティング

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use claw_mesh_common::{
    error::CoordinatorError,
    protocol::RouteRequest,
    types::{Message, Node, NodeStatus},
};
use tracing::{info, warn};

use super::{error_body, AppError};
use crate::{id, AppState};

/// POST /api/v1/route - メッセージの自動ルーティング
pub async fn route_auto(
    State(state): State<AppState>,
    payload: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let msg = build_message(payload, String::new())?;

    let node = match state.router.route(&msg).await {
        Ok(node) => node,
        Err(err) => {
            return Ok((StatusCode::SERVICE_UNAVAILABLE, error_body(&err.to_string()))
                .into_response());
        }
    };

    forward_to_node(&state, msg, node).await
}

/// POST /api/v1/route/{nodeId} - 指定ノードへのルーティング
pub async fn route_to_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    payload: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let msg = build_message(payload, node_id.clone())?;

    let node = match state.router.route(&msg).await {
        Ok(node) => node,
        Err(err) => {
            // ルーターはHTTPを知らない。レジストリを照会して
            // 未登録(404)・オフライン(502)・その他(503)を振り分ける。
            let status = match state.registry.get(&node_id).await {
                None => StatusCode::NOT_FOUND,
                Some(n) if n.status == NodeStatus::Offline => StatusCode::BAD_GATEWAY,
                Some(_) => StatusCode::SERVICE_UNAVAILABLE,
            };
            return Ok((status, error_body(&err.to_string())).into_response());
        }
    };

    forward_to_node(&state, msg, node).await
}

/// リクエストからメッセージを組み立てる
fn build_message(
    payload: Result<Json<RouteRequest>, JsonRejection>,
    target_node: String,
) -> Result<Message, AppError> {
    let Json(req) = payload
        .map_err(|_| CoordinatorError::Validation("invalid request body".to_string()))?;
    if req.content.is_empty() {
        return Err(CoordinatorError::Validation("content is required".to_string()).into());
    }

    Ok(Message {
        id: id::generate_id(),
        content: req.content,
        source: req.source,
        target_node,
        created_at: Utc::now(),
    })
}

/// 選択済みノードへ転送し、node_idを補完して返す
async fn forward_to_node(state: &AppState, msg: Message, node: Node) -> Result<Response, AppError> {
    info!(
        message_id = %msg.id,
        node_id = %node.id,
        name = %node.name,
        "forwarding message"
    );

    let token = state.registry.node_token(&node.id).await;
    match state.forwarder.forward_message(&node, &msg, &token).await {
        Ok(mut resp) => {
            resp.node_id = node.id;
            Ok((StatusCode::OK, Json(resp)).into_response())
        }
        Err(err) => {
            warn!(message_id = %msg.id, node_id = %node.id, error = %err, "forward failed");
            Err(CoordinatorError::Forwarding(err.to_string()).into())
        }
    }
}
