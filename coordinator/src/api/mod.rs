//! REST APIハンドラー
//!
//! ノード登録・ハートビート・ルーティング・ルール管理のHTTP表面

pub mod auth;
pub mod nodes;
pub mod routing;
pub mod rules;

use std::any::Any;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use claw_mesh_common::error::CoordinatorError;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info};

use crate::{dashboard, AppState};

/// インバウンドボディの上限 (1 MiB)
pub const MAX_REQUEST_BODY: usize = 1 << 20;

/// APIルーターを作成
///
/// 変更系のルートにのみBearer認証を重ねる。route_layerは呼び出し時点で
/// 登録済みのメソッドだけを包むため、認証不要のGETは後から連結する。
pub fn create_router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(state.clone(), auth::require_auth);

    Router::new()
        .route(
            "/api/v1/nodes/register",
            post(nodes::register_node).route_layer(auth.clone()),
        )
        .route("/api/v1/nodes", get(nodes::list_nodes))
        .route(
            "/api/v1/nodes/:id",
            delete(nodes::deregister_node)
                .route_layer(auth.clone())
                .get(nodes::get_node),
        )
        .route(
            "/api/v1/nodes/:id/heartbeat",
            post(nodes::heartbeat).route_layer(auth.clone()),
        )
        .route(
            "/api/v1/route",
            post(routing::route_auto).route_layer(auth.clone()),
        )
        .route(
            "/api/v1/route/:node_id",
            post(routing::route_to_node).route_layer(auth.clone()),
        )
        .route(
            "/api/v1/rules",
            post(rules::add_rule)
                .route_layer(auth.clone())
                .get(rules::list_rules),
        )
        .route(
            "/api/v1/rules/:id",
            delete(rules::delete_rule).route_layer(auth),
        )
        .route("/", get(dashboard::serve_dashboard))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

/// リクエストログミドルウェア（メソッド・パス・所要時間）
async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "request"
    );
    response
}

/// ハンドラー内のパニックを500 JSONへ変換する
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_body("internal server error"),
    )
        .into_response()
}

/// APIエラーラッパー。CoordinatorErrorをHTTPステータスへ対応付ける。
pub struct AppError(pub CoordinatorError);

impl From<CoordinatorError> for AppError {
    fn from(err: CoordinatorError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::NodeNotFound
            | CoordinatorError::RuleNotFound
            | CoordinatorError::TargetNotFound(_) => StatusCode::NOT_FOUND,
            CoordinatorError::AlreadyRegistered(_) => StatusCode::CONFLICT,
            CoordinatorError::TargetOffline(_) | CoordinatorError::Forwarding(_) => {
                StatusCode::BAD_GATEWAY
            }
            CoordinatorError::NoNodesAvailable => StatusCode::SERVICE_UNAVAILABLE,
            CoordinatorError::Store(_)
            | CoordinatorError::Serialization(_)
            | CoordinatorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, error_body(&self.0.to_string())).into_response()
    }
}

/// `{"error": "..."}` 形式のレスポンスボディ
pub fn error_body(message: &str) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "error": message }))
}
