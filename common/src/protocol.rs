//! 通信プロトコル定義
//!
//! Node↔Coordinator間およびGateway向けのリクエスト/レスポンス型

use serde::{Deserialize, Serialize};

use crate::types::{Capabilities, NodeStatus};

/// ノード登録リクエスト
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    /// 表示名
    #[serde(default)]
    pub name: String,
    /// 到達可能なエンドポイント (host:port)
    #[serde(default)]
    pub endpoint: String,
    /// 広告するケイパビリティ
    #[serde(default)]
    pub capabilities: Capabilities,
}

/// ノード登録レスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterResponse {
    /// 割り当てられたノードID
    pub node_id: String,
    /// ノード専用トークン
    pub token: String,
}

/// ハートビートリクエスト
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatRequest {
    /// 自己申告ステータス
    pub status: NodeStatus,
}

/// ルーティングリクエスト
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RouteRequest {
    /// メッセージ本文
    #[serde(default)]
    pub content: String,
    /// 送信元タグ
    #[serde(default)]
    pub source: String,
}

/// Gatewayチャット補完リクエスト（OpenAI互換）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// モデル名
    pub model: String,
    /// メッセージ列
    pub messages: Vec<ChatMessage>,
}

/// チャットメッセージ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// ロール ("user", "assistant", ...)
    pub role: String,
    /// 本文
    pub content: String,
}

/// Gatewayチャット補完レスポンス
///
/// 実在のGatewayは多数の追加フィールドを返すため未知フィールドは許容する。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionResponse {
    /// 候補列
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// 補完候補
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatChoice {
    /// 応答メッセージ
    pub message: ChatMessage,
}
