//! Nodeエージェントライフサイクル
//!
//! 登録 → ハートビートループ → ハンドラー起動 → グレースフル停止

use std::sync::Arc;
use std::time::Duration;

use claw_mesh_common::{
    config::AgentConfig,
    error::{AgentError, AgentResult},
    protocol::RegisterRequest,
    types::{Capabilities, NodeStatus},
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    capabilities::detect_capabilities,
    client::CoordinatorClient,
    gateway::{resolve_gateway_token, GatewayClient, HttpGatewayClient},
    handler::{self, HandlerState},
};

/// リスナー停止の猶予時間
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Nodeエージェント
pub struct Agent {
    config: AgentConfig,
    capabilities: Capabilities,
    client: CoordinatorClient,
    shutdown: watch::Sender<bool>,
    heartbeat_task: Option<JoinHandle<()>>,
    server_task: Option<JoinHandle<()>>,
    server_shutdown: Option<oneshot::Sender<()>>,
    handler_addr: Option<std::net::SocketAddr>,
    deregistered: bool,
}

impl Agent {
    /// 設定からエージェントを作成する
    pub fn new(config: AgentConfig) -> Self {
        let capabilities = detect_capabilities(
            config.tags.clone(),
            config.skills.clone(),
            config.gpu,
            config.memory_gb,
        );
        let client = CoordinatorClient::new(config.coordinator_url.clone(), config.token.clone());
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            capabilities,
            client,
            shutdown,
            heartbeat_task: None,
            server_task: None,
            server_shutdown: None,
            handler_addr: None,
            deregistered: false,
        }
    }

    /// Coordinatorへ登録する
    pub async fn register(&mut self) -> AgentResult<()> {
        self.client
            .register(RegisterRequest {
                name: self.config.name.clone(),
                endpoint: self.config.endpoint.clone(),
                capabilities: self.capabilities.clone(),
            })
            .await?;
        Ok(())
    }

    /// ハートビートループを開始する。複数回呼んでも最初の1回のみ有効。
    pub fn start_heartbeat(&mut self) {
        if self.heartbeat_task.is_some() {
            return;
        }

        let client = self.client.clone();
        let interval = Duration::from_secs(self.config.heartbeat_interval_secs);
        let mut shutdown_rx = self.shutdown.subscribe();

        self.heartbeat_task = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut timer = tokio::time::interval_at(start, interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            return;
                        }
                    }
                    _ = timer.tick() => {
                        // 失敗してもループは続ける
                        if let Err(err) = client.send_heartbeat(NodeStatus::Online).await {
                            warn!(error = %err, "heartbeat failed");
                        }
                    }
                }
            }
        }));
    }

    /// ローカルのメッセージハンドラーを起動する
    pub async fn start_handler(&mut self) -> AgentResult<()> {
        let gateway: Option<Arc<dyn GatewayClient>> = if !self.config.gateway.endpoint.is_empty() {
            let token = resolve_gateway_token(&self.config.gateway.token, "");
            info!(endpoint = %self.config.gateway.endpoint, "gateway client configured");
            Some(Arc::new(HttpGatewayClient::new(
                self.config.gateway.endpoint.clone(),
                token,
                self.config.gateway.timeout_secs,
            )))
        } else {
            warn!("no gateway endpoint configured, messages will be echoed");
            None
        };

        let router = handler::create_router(HandlerState {
            token: self.client.token().to_string(),
            gateway,
        });

        let listener = tokio::net::TcpListener::bind(&self.config.listen_addr)
            .await
            .map_err(|e| {
                AgentError::Internal(format!(
                    "listening on {}: {e}",
                    self.config.listen_addr
                ))
            })?;
        self.handler_addr = listener.local_addr().ok();
        info!(addr = %self.config.listen_addr, "node handler listening");

        let (tx, rx) = oneshot::channel::<()>();
        self.server_shutdown = Some(tx);
        self.server_task = Some(tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
            if let Err(err) = result {
                error!(error = %err, "node handler server error");
            }
        }));
        Ok(())
    }

    /// エージェントを停止する。
    /// ハートビートループ停止 → リスナーのグレースフル停止（最大5秒） →
    /// Coordinatorからの登録解除の順に行う。複数回呼んでも安全。
    pub async fn shutdown(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.heartbeat_task.take() {
            let _ = handle.await;
        }

        if let Some(tx) = self.server_shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.server_task.take() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!("node handler did not stop within grace period, aborting");
                abort.abort();
            }
        }

        if self.client.node_id().is_some() && !self.deregistered {
            match self.client.deregister().await {
                Ok(()) => self.deregistered = true,
                Err(err) => warn!(error = %err, "failed to deregister"),
            }
        }
    }

    /// 割り当て済みノードID
    pub fn node_id(&self) -> Option<&str> {
        self.client.node_id()
    }

    /// ハンドラーが実際にバインドしたアドレス（起動後のみ）
    pub fn handler_addr(&self) -> Option<std::net::SocketAddr> {
        self.handler_addr
    }
}
