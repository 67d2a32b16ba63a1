//! ルール管理APIハンドラー
//!
//! ルーティングルールの追加・削除・一覧と検証

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use claw_mesh_common::{
    error::{CoordinatorError, CoordinatorResult},
    types::RoutingRule,
};
use tracing::info;

use super::AppError;
use crate::AppState;

/// 受理する戦略値
const VALID_STRATEGIES: [&str; 2] = ["", "least-busy"];

/// GET /api/v1/rules - ルール一覧
pub async fn list_rules(State(state): State<AppState>) -> Json<Vec<RoutingRule>> {
    Json(state.router.list_rules().await)
}

/// POST /api/v1/rules - ルール追加
pub async fn add_rule(
    State(state): State<AppState>,
    payload: Result<Json<RoutingRule>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(rule) = payload
        .map_err(|_| CoordinatorError::Validation("invalid request body".to_string()))?;

    validate_rule(&rule)?;

    let rule = state.router.add_rule(rule).await?;
    info!(rule_id = %rule.id, "routing rule added");
    Ok((StatusCode::CREATED, Json(rule)))
}

/// DELETE /api/v1/rules/{id} - ルール削除
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !state.router.remove_rule(&rule_id).await? {
        return Err(CoordinatorError::RuleNotFound.into());
    }
    info!(rule_id = %rule_id, "routing rule deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// ルールの矛盾や不正値を検証する
pub fn validate_rule(rule: &RoutingRule) -> CoordinatorResult<()> {
    let is_wild = rule.criteria.is_wildcard();
    let has_criteria = rule.criteria.has_criteria();

    if !is_wild && !has_criteria {
        return Err(CoordinatorError::Validation(
            "rule must have at least one match criterion or be a wildcard".to_string(),
        ));
    }

    if is_wild && has_criteria {
        return Err(CoordinatorError::Validation(
            "wildcard rule cannot have other match criteria".to_string(),
        ));
    }

    if is_wild && !rule.target.is_empty() {
        return Err(CoordinatorError::Validation(
            "wildcard rule cannot specify a target node".to_string(),
        ));
    }

    if !VALID_STRATEGIES.contains(&rule.strategy.as_str()) {
        return Err(CoordinatorError::Validation(format!(
            "invalid strategy {:?}; valid values: least-busy",
            rule.strategy
        )));
    }

    Ok(())
}
