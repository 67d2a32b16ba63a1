//! claw-mesh Nodeエージェント エントリーポイント

use clap::Parser;
use claw_mesh_common::config::{AgentConfig, GatewayConfig, TOKEN_ENV};
use claw_mesh_node::{agent::Agent, logging};
use tracing::{error, info};

/// claw-mesh ノードエージェント
#[derive(Parser, Debug)]
#[command(name = "claw-mesh-node", version)]
struct Args {
    /// CoordinatorのURL
    #[arg(long, default_value = "http://localhost:9180")]
    coordinator_url: String,

    /// 登録時に提示するトークン（未指定ならCLAW_MESH_TOKEN環境変数）
    #[arg(long)]
    token: Option<String>,

    /// 表示名（未指定ならHOSTNAME）
    #[arg(long)]
    name: Option<String>,

    /// Coordinatorから到達可能な自ノードのエンドポイント (host:port)
    #[arg(long)]
    endpoint: String,

    /// ローカルハンドラーのリッスンアドレス
    #[arg(long, default_value = "0.0.0.0:9121")]
    listen: String,

    /// 付与するタグ（カンマ区切り）
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// 広告するスキル（カンマ区切り）
    #[arg(long, value_delimiter = ',')]
    skills: Vec<String>,

    /// GPU搭載を広告する
    #[arg(long)]
    gpu: bool,

    /// 搭載メモリ (GB)
    #[arg(long, default_value_t = 0)]
    memory_gb: u64,

    /// Gatewayエンドポイント (host:port、未指定ならエコー動作)
    #[arg(long)]
    gateway_endpoint: Option<String>,

    /// Gateway認証トークン（未指定なら環境変数から解決）
    #[arg(long)]
    gateway_token: Option<String>,

    /// Gatewayリクエストタイムアウト（秒）
    #[arg(long, default_value_t = 120)]
    gateway_timeout: u64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = logging::init() {
        eprintln!("failed to initialize logging: {err}");
    }

    let token = args
        .token
        .or_else(|| std::env::var(TOKEN_ENV).ok())
        .unwrap_or_default();
    let name = args
        .name
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "claw-node".to_string());

    let config = AgentConfig {
        coordinator_url: args.coordinator_url,
        token,
        name,
        endpoint: args.endpoint,
        listen_addr: args.listen,
        tags: args.tags,
        skills: args.skills,
        gpu: args.gpu,
        memory_gb: args.memory_gb,
        gateway: GatewayConfig {
            endpoint: args.gateway_endpoint.unwrap_or_default(),
            token: args.gateway_token.unwrap_or_default(),
            timeout_secs: args.gateway_timeout,
        },
        ..Default::default()
    };

    let mut agent = Agent::new(config);

    if let Err(err) = agent.register().await {
        error!(error = %err, "registration failed");
        std::process::exit(1);
    }
    agent.start_heartbeat();
    if let Err(err) = agent.start_handler().await {
        error!(error = %err, "failed to start handler");
        std::process::exit(1);
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    agent.shutdown().await;
}
