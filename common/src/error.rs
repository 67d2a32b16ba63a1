//! エラー型定義
//!
//! 統一エラー型（thiserror使用）。ワイヤー上に現れるメッセージは
//! APIレスポンスの `{"error": ...}` にそのまま載る。

use thiserror::Error;

/// Coordinatorエラー型
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// リクエスト検証エラー
    #[error("{0}")]
    Validation(String),

    /// ノード未登録
    #[error("node not found")]
    NodeNotFound,

    /// ルール未登録
    #[error("rule not found")]
    RuleNotFound,

    /// 明示的な宛先ノードが存在しない
    #[error("target node {0:?} not found")]
    TargetNotFound(String),

    /// 明示的な宛先ノードがオフライン
    #[error("target node {0:?} is offline")]
    TargetOffline(String),

    /// ルーティング可能なノードがない
    #[error("no online nodes available")]
    NoNodesAvailable,

    /// ノードID衝突
    #[error("node {0} already registered")]
    AlreadyRegistered(String),

    /// ノードへの転送失敗
    #[error("forwarding failed: {0}")]
    Forwarding(String),

    /// ルールストアのI/Oエラー
    #[error("storage error: {0}")]
    Store(#[from] std::io::Error),

    /// シリアライゼーションエラー
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 内部エラー
    #[error("internal error: {0}")]
    Internal(String),
}

/// Nodeエージェントエラー型
#[derive(Debug, Error)]
pub enum AgentError {
    /// Coordinatorへの接続エラー
    #[error("failed to reach coordinator: {0}")]
    CoordinatorConnection(String),

    /// 登録エラー
    #[error("registration failed: {0}")]
    Registration(String),

    /// ハートビート送信エラー
    #[error("heartbeat failed: {0}")]
    Heartbeat(String),

    /// Gateway認証エラー
    #[error("gateway auth failed (401): {0}")]
    GatewayAuth(String),

    /// Gatewayエラー
    #[error("gateway error: {0}")]
    Gateway(String),

    /// 内部エラー
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result型エイリアス（Coordinator）
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Result型エイリアス（Agent）
pub type AgentResult<T> = Result<T, AgentError>;
