//! ダッシュボード
//!
//! 組み込みの単一ページを配信する。管理トークンを `window.__TOKEN__` に
//! 注入する（オペレーターローカル運用を前提にした既知の弱化）。

use axum::{extract::State, response::Html};

use crate::AppState;

/// 埋め込みダッシュボードHTML
const DASHBOARD_HTML: &str = include_str!("dashboard.html");

/// トークン注入用プレースホルダー
const TOKEN_PLACEHOLDER: &str = "{{TOKEN}}";

/// GET / - ダッシュボード配信
pub async fn serve_dashboard(State(state): State<AppState>) -> Html<String> {
    Html(DASHBOARD_HTML.replace(TOKEN_PLACEHOLDER, &state.config.token))
}
