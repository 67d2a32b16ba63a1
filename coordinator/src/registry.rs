//! ノードレジストリ
//!
//! ノードの状態とノードトークンをメモリ内で管理する。
//! 読み取りは常にディープコピーを返し、内部レコードへの参照を外に出さない。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use claw_mesh_common::{
    error::{CoordinatorError, CoordinatorResult},
    types::{Node, NodeStatus},
};
use tokio::sync::RwLock;
use tracing::warn;

/// レコードマップとトークン索引（正引き/逆引き）を1つのロックで保護する
#[derive(Default)]
struct RegistryInner {
    nodes: HashMap<String, Node>,
    tokens_by_node: HashMap<String, String>,
    nodes_by_token: HashMap<String, String>,
}

/// ノードレジストリ
#[derive(Clone, Default)]
pub struct NodeRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl NodeRegistry {
    /// 新しい空のレジストリを作成
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner::default())),
        }
    }

    /// ノードを登録する。IDが衝突した場合はエラー。
    pub async fn add(&self, node: Node) -> CoordinatorResult<()> {
        let mut inner = self.inner.write().await;
        if inner.nodes.contains_key(&node.id) {
            return Err(CoordinatorError::AlreadyRegistered(node.id));
        }
        inner.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// ノードを削除する。トークン索引も同時に消す。削除できたかを返す。
    pub async fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.write().await;
        if inner.nodes.remove(id).is_none() {
            return false;
        }
        if let Some(token) = inner.tokens_by_node.remove(id) {
            inner.nodes_by_token.remove(&token);
        }
        true
    }

    /// 指定IDのノードが登録されているか
    pub async fn exists(&self, id: &str) -> bool {
        let inner = self.inner.read().await;
        inner.nodes.contains_key(id)
    }

    /// ノードをディープコピーで取得
    pub async fn get(&self, id: &str) -> Option<Node> {
        let inner = self.inner.read().await;
        inner.nodes.get(id).cloned()
    }

    /// 全ノードをディープコピーで取得（登録順）
    pub async fn list(&self) -> Vec<Node> {
        let inner = self.inner.read().await;
        let mut list: Vec<Node> = inner.nodes.values().cloned().collect();
        list.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        list
    }

    /// ノードのステータスを更新する。ノードが存在したかを返す。
    pub async fn update_status(&self, id: &str, status: NodeStatus) -> bool {
        let mut inner = self.inner.write().await;
        match inner.nodes.get_mut(id) {
            Some(node) => {
                node.status = status;
                true
            }
            None => false,
        }
    }

    /// ハートビートを記録する。ステータスと最終確認時刻を更新する。
    pub async fn record_heartbeat(&self, id: &str, status: NodeStatus) -> bool {
        let mut inner = self.inner.write().await;
        match inner.nodes.get_mut(id) {
            Some(node) => {
                node.last_heartbeat = Utc::now();
                node.status = status;
                true
            }
            None => false,
        }
    }

    /// ハートビートが途絶したノードをオフラインにする（冪等）
    pub async fn mark_offline_if_stale(&self, timeout: Duration) {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        for node in inner.nodes.values_mut() {
            if node.status == NodeStatus::Offline {
                continue;
            }
            let elapsed = now.signed_duration_since(node.last_heartbeat);
            let stale = elapsed.to_std().map(|e| e > timeout).unwrap_or(false);
            if stale {
                warn!(
                    node_id = %node.id,
                    name = %node.name,
                    "node missed heartbeat, marking offline"
                );
                node.status = NodeStatus::Offline;
            }
        }
    }

    /// ノードトークンを設定する（正引き/逆引き両索引を更新）
    pub async fn set_node_token(&self, id: &str, token: &str) {
        let mut inner = self.inner.write().await;
        if let Some(old) = inner.tokens_by_node.insert(id.to_string(), token.to_string()) {
            inner.nodes_by_token.remove(&old);
        }
        inner.nodes_by_token.insert(token.to_string(), id.to_string());
    }

    /// ノードトークンを取得する。未発行なら空文字列。
    pub async fn node_token(&self, id: &str) -> String {
        let inner = self.inner.read().await;
        inner.tokens_by_node.get(id).cloned().unwrap_or_default()
    }

    /// トークンが現在有効なノードトークンか（逆引き索引の定数時間照合）
    pub async fn validate_node_token(&self, token: &str) -> bool {
        let inner = self.inner.read().await;
        inner.nodes_by_token.contains_key(token)
    }
}
