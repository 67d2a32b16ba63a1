//! メッセージハンドラー
//!
//! Coordinatorから転送されたメッセージを受けるノード側HTTP表面。
//! Gatewayが構成されていればパススルーし、無ければエコーで応える。

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use claw_mesh_common::types::{Message, MessageResponse};
use tracing::{info, warn};

use crate::gateway::GatewayClient;

/// インバウンドボディの上限 (1 MiB)
const MAX_REQUEST_BODY: usize = 1 << 20;

/// ハンドラー共有状態
#[derive(Clone)]
pub struct HandlerState {
    /// 照合するノードトークン（空なら認証無効）
    pub token: String,
    /// Gatewayクライアント（Noneならエコーにフォールバック）
    pub gateway: Option<Arc<dyn GatewayClient>>,
}

/// ノード側ハンドラーのルーターを作成
pub fn create_router(state: HandlerState) -> Router {
    Router::new()
        .route(
            "/api/v1/messages",
            post(handle_message).route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_auth,
            )),
        )
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .with_state(state)
}

/// GET /healthz - アクティブプローブ応答
async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Bearerトークン認証ミドルウェア。トークン未保持なら素通し。
async fn require_auth(
    State(state): State<HandlerState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if state.token.is_empty() {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "missing or invalid authorization header",
        ));
    };
    if token != state.token {
        return Err(error_response(StatusCode::UNAUTHORIZED, "invalid token"));
    }
    Ok(next.run(request).await)
}

/// POST /api/v1/messages - 転送メッセージの受信
async fn handle_message(
    State(state): State<HandlerState>,
    payload: Result<Json<Message>, JsonRejection>,
) -> Response {
    let msg = match payload {
        Ok(Json(msg)) => msg,
        Err(err) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("invalid message body: {err}"),
            );
        }
    };

    if msg.id.is_empty() || msg.content.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "id and content are required");
    }

    info!(message_id = %msg.id, "received message");

    let Some(gateway) = &state.gateway else {
        // Gateway未構成時のエコーフォールバック
        warn!(message_id = %msg.id, "no gateway client configured, echoing message");
        let resp = MessageResponse {
            message_id: msg.id,
            node_id: String::new(),
            response: format!("[claw-mesh] Gateway not available. Message: {}", msg.content),
        };
        return (StatusCode::OK, Json(resp)).into_response();
    };

    match gateway.send_message(&msg).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => {
            warn!(message_id = %msg.id, error = %err, "gateway forwarding failed");
            error_response(StatusCode::BAD_GATEWAY, &format!("gateway error: {err}"))
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
