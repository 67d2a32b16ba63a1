//! claw-mesh Coordinator エントリーポイント

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use claw_mesh_common::config::CoordinatorConfig;
use claw_mesh_coordinator::{
    api, forwarder::Forwarder, health::HealthChecker, logging, registry::NodeRegistry,
    router::MessageRouter, store::RuleStore, AppState,
};
use tracing::{info, warn};

/// claw-mesh コントロールプレーン Coordinator
#[derive(Parser, Debug)]
#[command(name = "claw-mesh-coordinator", version)]
struct Args {
    /// バインドホスト
    #[arg(long)]
    host: Option<String>,

    /// リッスンポート
    #[arg(long)]
    port: Option<u16>,

    /// 管理トークン（未指定ならCLAW_MESH_TOKEN環境変数）
    #[arg(long)]
    token: Option<String>,

    /// プライベート/ループバックなエンドポイントの登録を許可
    #[arg(long)]
    allow_private: bool,

    /// データディレクトリ（既定: ~/.claw-mesh）
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(err) = logging::init() {
        eprintln!("failed to initialize logging: {err}");
    }

    let mut config = CoordinatorConfig::default();
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(token) = args.token {
        config.token = token;
    }
    config.allow_private = args.allow_private;
    config.data_dir = args.data_dir;
    config.token = config.resolve_token();
    if config.token.is_empty() {
        warn!("no admin token configured, mutating endpoints are unauthenticated");
    }

    // ルールストアとルーターを初期化
    let store_path = config.resolve_data_dir().join("rules.json");
    let store = RuleStore::new(&store_path).expect("failed to initialize rule store");
    info!(path = %store_path.display(), "rule store initialized");

    let registry = NodeRegistry::new();
    let router = MessageRouter::new(registry.clone(), store);
    router.load().await.expect("failed to load routing rules");

    // ヘルスチェッカー起動
    let health = Arc::new(HealthChecker::new(
        registry.clone(),
        Duration::from_secs(config.node_stale_timeout_secs),
        Duration::from_secs(config.health_check_interval_secs),
    ));
    health.start().await;

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        registry,
        router,
        forwarder: Forwarder::new(),
        config: Arc::new(config),
    };

    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind to address");
    info!(addr = %bind_addr, "coordinator listening");

    let shutdown_health = Arc::clone(&health);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .expect("server error");

    shutdown_health.stop().await;
}
