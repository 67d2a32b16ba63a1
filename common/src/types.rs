//! コアデータモデル
//!
//! ノード・ケイパビリティ・ルーティングルール・メッセージの型定義

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// ノードの状態
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// オンライン（受付可能）
    Online,
    /// ビジー（処理中）
    Busy,
    /// オフライン
    Offline,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeStatus::Online => "online",
            NodeStatus::Busy => "busy",
            NodeStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(NodeStatus::Online),
            "busy" => Ok(NodeStatus::Busy),
            "offline" => Ok(NodeStatus::Offline),
            other => Err(format!("invalid status value: {other}")),
        }
    }
}

/// ノードが広告するケイパビリティ
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Capabilities {
    /// OS名（例: "linux", "macos"）
    #[serde(default)]
    pub os: String,
    /// アーキテクチャ（例: "x86_64", "aarch64"）
    #[serde(default)]
    pub arch: String,
    /// GPU搭載フラグ
    #[serde(default)]
    pub gpu: bool,
    /// 搭載メモリ (GB)
    #[serde(default)]
    pub memory_gb: u64,
    /// 運用者が付与するタグ
    #[serde(default)]
    pub tags: Vec<String>,
    /// 検出済みスキル
    #[serde(default)]
    pub skills: Vec<String>,
}

impl Capabilities {
    /// スキルまたはタグとして広告されているか
    pub fn has_skill(&self, skill: &str) -> bool {
        self.skills.iter().any(|s| s == skill) || self.tags.iter().any(|t| t == skill)
    }
}

/// 登録済みワーカーノード
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Coordinatorが割り当てる不透明ID
    pub id: String,
    /// 表示名
    pub name: String,
    /// 到達可能なエンドポイント (host:port)
    pub endpoint: String,
    /// ケイパビリティ
    pub capabilities: Capabilities,
    /// 現在の状態
    pub status: NodeStatus,
    /// 最終ハートビート時刻
    pub last_heartbeat: DateTime<Utc>,
    /// 登録日時
    pub registered_at: DateTime<Utc>,
}

/// ルーティングルールのマッチ条件
///
/// 真偽値条件は三値（未設定 / false / true）。未設定と false は同義ではない。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MatchCriteria {
    /// GPU必須フラグ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_gpu: Option<bool>,
    /// OS完全一致条件（空なら未設定）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub requires_os: String,
    /// スキル/タグ条件（空なら未設定）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub requires_skill: String,
    /// ワイルドカード（他条件と排他）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wildcard: Option<bool>,
}

impl MatchCriteria {
    /// ワイルドカード条件か
    pub fn is_wildcard(&self) -> bool {
        self.wildcard.unwrap_or(false)
    }

    /// ワイルドカード以外の条件が1つでも設定されているか
    pub fn has_criteria(&self) -> bool {
        self.requires_gpu.is_some()
            || !self.requires_os.is_empty()
            || !self.requires_skill.is_empty()
    }

    /// ノードが全条件を満たすか（短絡評価の論理積）
    pub fn matches(&self, node: &Node) -> bool {
        if self.requires_gpu == Some(true) && !node.capabilities.gpu {
            return false;
        }
        if !self.requires_os.is_empty() && self.requires_os != node.capabilities.os {
            return false;
        }
        if !self.requires_skill.is_empty() && !node.capabilities.has_skill(&self.requires_skill) {
            return false;
        }
        true
    }
}

/// ルーティングルール
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RoutingRule {
    /// Coordinatorが割り当てるID
    #[serde(default)]
    pub id: String,
    /// マッチ条件
    #[serde(rename = "match", default)]
    pub criteria: MatchCriteria,
    /// 明示的なターゲット（ノード名またはID）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    /// 選択戦略（"" または "least-busy"）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub strategy: String,
}

/// メッシュを流れるメッセージ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Message {
    /// メッセージID
    pub id: String,
    /// 本文
    pub content: String,
    /// 送信元タグ
    #[serde(default)]
    pub source: String,
    /// 明示的な宛先ノード（ルール評価をバイパス）
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target_node: String,
    /// 作成時刻
    pub created_at: DateTime<Utc>,
}

/// メッセージ処理結果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    /// 対応するメッセージID
    #[serde(default)]
    pub message_id: String,
    /// 処理したノードID（転送層が補完）
    #[serde(default)]
    pub node_id: String,
    /// 応答本文
    #[serde(default)]
    pub response: String,
}
