//! 認証ミドルウェア
//!
//! Bearerトークンを検証する。管理トークンまたは有効なノードトークンの
//! いずれかを受け付ける（和集合照合）。

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error_body;
use crate::AppState;

/// 変更系エンドポイントのBearer認証ミドルウェア
///
/// 管理トークンが未設定の場合は認証を行わない。
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, Response> {
    if state.config.token.is_empty() {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let Some(token) = auth_header.strip_prefix("Bearer ") else {
        return Err((
            StatusCode::UNAUTHORIZED,
            error_body("missing or invalid authorization header"),
        )
            .into_response());
    };

    // 管理トークン、または逆引き索引に載っているノードトークンを許可
    if token != state.config.token && !state.registry.validate_node_token(token).await {
        return Err((StatusCode::UNAUTHORIZED, error_body("invalid token")).into_response());
    }

    Ok(next.run(request).await)
}
