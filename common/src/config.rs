//! 設定管理
//!
//! CoordinatorConfig / AgentConfig等の設定構造体。
//! 設定ファイルの読み込み自体は外部コンポーネントの責務で、
//! ここではデフォルト値と環境変数の解決のみを扱う。

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Coordinator管理トークンの代替ソースとなる環境変数
pub const TOKEN_ENV: &str = "CLAW_MESH_TOKEN";
/// Gatewayトークンの環境変数（優先）
pub const GATEWAY_TOKEN_ENV: &str = "OPENCLAW_GATEWAY_TOKEN";
/// Gatewayトークンの環境変数（旧名、後方互換）
pub const GATEWAY_TOKEN_ENV_LEGACY: &str = "CLAWDBOT_GATEWAY_TOKEN";

/// Coordinator設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// バインドホスト (デフォルト: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// ポート番号 (デフォルト: 9180)
    #[serde(default = "default_port")]
    pub port: u16,

    /// 管理トークン（空なら認証無効）
    #[serde(default)]
    pub token: String,

    /// プライベート/ループバックなエンドポイントの登録を許可
    #[serde(default)]
    pub allow_private: bool,

    /// データディレクトリ (デフォルト: ~/.claw-mesh)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// ヘルスチェック間隔（秒）(デフォルト: 10)
    #[serde(default = "default_health_check_interval")]
    pub health_check_interval_secs: u64,

    /// ハートビート途絶をオフライン判定するまでの秒数 (デフォルト: 30)
    #[serde(default = "default_stale_timeout")]
    pub node_stale_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9180
}

fn default_health_check_interval() -> u64 {
    10
}

fn default_stale_timeout() -> u64 {
    30
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            token: String::new(),
            allow_private: false,
            data_dir: None,
            health_check_interval_secs: default_health_check_interval(),
            node_stale_timeout_secs: default_stale_timeout(),
        }
    }
}

impl CoordinatorConfig {
    /// 管理トークンを解決する。優先度: 設定値 > CLAW_MESH_TOKEN環境変数
    pub fn resolve_token(&self) -> String {
        if !self.token.is_empty() {
            return self.token.clone();
        }
        env::var(TOKEN_ENV).unwrap_or_default()
    }

    /// データディレクトリを解決する。未指定なら ~/.claw-mesh
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        default_data_dir()
    }
}

/// 既定のデータディレクトリ（~/.claw-mesh、ホーム不明時はカレント）
pub fn default_data_dir() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".claw-mesh"))
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Gateway接続設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gatewayエンドポイント (host:port、空なら未構成)
    #[serde(default)]
    pub endpoint: String,

    /// Gateway認証トークン
    #[serde(default)]
    pub token: String,

    /// リクエストタイムアウト（秒）(デフォルト: 120)
    #[serde(default = "default_gateway_timeout")]
    pub timeout_secs: u64,
}

fn default_gateway_timeout() -> u64 {
    120
}

/// Nodeエージェント設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// CoordinatorのURL (デフォルト: "http://localhost:9180")
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,

    /// 登録時に提示するトークン（Coordinator管理トークン）
    #[serde(default)]
    pub token: String,

    /// 表示名
    #[serde(default)]
    pub name: String,

    /// Coordinatorから到達可能な自ノードのエンドポイント (host:port)
    #[serde(default)]
    pub endpoint: String,

    /// ローカルハンドラーのリッスンアドレス (デフォルト: "0.0.0.0:9121")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// ハートビート送信間隔（秒）(デフォルト: 15)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// 運用者が付与するタグ
    #[serde(default)]
    pub tags: Vec<String>,

    /// 広告するスキル
    #[serde(default)]
    pub skills: Vec<String>,

    /// GPU搭載フラグ
    #[serde(default)]
    pub gpu: bool,

    /// 搭載メモリ (GB)
    #[serde(default)]
    pub memory_gb: u64,

    /// Gateway接続設定
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_coordinator_url() -> String {
    "http://localhost:9180".to_string()
}

fn default_listen_addr() -> String {
    "0.0.0.0:9121".to_string()
}

fn default_heartbeat_interval() -> u64 {
    15
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            coordinator_url: default_coordinator_url(),
            token: String::new(),
            name: String::new(),
            endpoint: String::new(),
            listen_addr: default_listen_addr(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            tags: Vec::new(),
            skills: Vec::new(),
            gpu: false,
            memory_gb: 0,
            gateway: GatewayConfig::default(),
        }
    }
}
