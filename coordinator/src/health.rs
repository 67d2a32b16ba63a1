//! ヘルスチェッカー
//!
//! 一定間隔でハートビート途絶を検知し、必要に応じて各ノードの
//! /healthz をアクティブに叩いてオフライン判定する。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use claw_mesh_common::types::NodeStatus;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::registry::NodeRegistry;

/// アクティブプローブのタイムアウト
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// 連続プローブ失敗の既定しきい値
const DEFAULT_FAIL_THRESHOLD: u32 = 2;

struct CheckerInner {
    registry: NodeRegistry,
    stale_timeout: Duration,
    interval: Duration,
    active_probe: bool,
    fail_threshold: u32,
    probe_client: reqwest::Client,
    /// ノードIDごとの連続プローブ失敗回数
    failures: Mutex<HashMap<String, u32>>,
}

/// ヘルスチェッカー
pub struct HealthChecker {
    inner: Arc<CheckerInner>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthChecker {
    /// ヘルスチェッカーを作成する。
    /// `stale_timeout` はハートビート途絶をオフライン判定するまでの時間、
    /// `interval` はチェック周期。アクティブプローブは既定で有効。
    pub fn new(registry: NodeRegistry, stale_timeout: Duration, interval: Duration) -> Self {
        let probe_client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(CheckerInner {
                registry,
                stale_timeout,
                interval,
                active_probe: true,
                fail_threshold: DEFAULT_FAIL_THRESHOLD,
                probe_client,
                failures: Mutex::new(HashMap::new()),
            }),
            shutdown,
            task: Mutex::new(None),
        }
    }

    /// アクティブプローブの有効/無効を切り替える（起動前に設定する）
    pub fn with_active_probe(mut self, enabled: bool) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.active_probe = enabled;
        }
        self
    }

    /// バックグラウンドループを開始する。複数回呼んでも最初の1回のみ有効。
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }
        let _ = self.shutdown.send(false);

        let inner = Arc::clone(&self.inner);
        let mut shutdown_rx = self.shutdown.subscribe();
        *task = Some(tokio::spawn(async move {
            info!(
                interval_secs = inner.interval.as_secs(),
                stale_timeout_secs = inner.stale_timeout.as_secs(),
                active_probe = inner.active_probe,
                "health checker started"
            );
            let start = tokio::time::Instant::now() + inner.interval;
            let mut timer = tokio::time::interval_at(start, inner.interval);
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("health checker stopped");
                            return;
                        }
                    }
                    _ = timer.tick() => {
                        inner.tick().await;
                    }
                }
            }
        }));
    }

    /// ループを停止し、終了を待つ。戻った時点で進行中のプローブは無い。
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

impl CheckerInner {
    /// 1周期分のチェック: 途絶スイープ → アクティブプローブ
    async fn tick(&self) {
        self.registry.mark_offline_if_stale(self.stale_timeout).await;
        if self.active_probe {
            self.probe_nodes().await;
        }
    }

    /// オフライン以外の全ノードへ GET /healthz を発行する
    async fn probe_nodes(&self) {
        let nodes = self.registry.list().await;
        for node in nodes {
            if node.status == NodeStatus::Offline {
                continue;
            }
            let url = format!("http://{}/healthz", node.endpoint);
            let healthy = match self.probe_client.get(&url).send().await {
                Ok(resp) => resp.status() == reqwest::StatusCode::OK,
                Err(_) => false,
            };
            if healthy {
                self.clear_probe_failure(&node.id).await;
            } else {
                self.record_probe_failure(&node.id, &node.name).await;
            }
        }
    }

    /// 連続失敗をカウントし、しきい値到達でオフライン化する
    async fn record_probe_failure(&self, node_id: &str, name: &str) {
        let reached = {
            let mut failures = self.failures.lock().await;
            let count = failures.entry(node_id.to_string()).or_insert(0);
            *count += 1;
            if *count >= self.fail_threshold {
                failures.remove(node_id);
                true
            } else {
                false
            }
        };
        if reached {
            warn!(
                node_id = %node_id,
                name = %name,
                threshold = self.fail_threshold,
                "node failed active probes, marking offline"
            );
            self.registry
                .update_status(node_id, NodeStatus::Offline)
                .await;
        }
    }

    /// 成功時に失敗カウンタをクリアする
    async fn clear_probe_failure(&self, node_id: &str) {
        let mut failures = self.failures.lock().await;
        failures.remove(node_id);
    }
}
