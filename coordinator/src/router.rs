//! ルーティングエンジン
//!
//! 順序付きルール集合をレジストリのライブビューに対して評価し、
//! メッセージの宛先ノードを決定する。ルール変更は保存成功時のみ反映される。

use std::sync::Arc;

use claw_mesh_common::{
    error::{CoordinatorError, CoordinatorResult},
    types::{Message, Node, NodeStatus, RoutingRule},
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{id, registry::NodeRegistry, store::RuleStore};

/// ルーティングエンジン
#[derive(Clone)]
pub struct MessageRouter {
    registry: NodeRegistry,
    store: Arc<RuleStore>,
    rules: Arc<RwLock<Vec<RoutingRule>>>,
}

impl MessageRouter {
    /// レジストリとストアをバックエンドとするルーターを作成
    pub fn new(registry: NodeRegistry, store: RuleStore) -> Self {
        Self {
            registry,
            store: Arc::new(store),
            rules: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// 起動時にストアからルール集合を読み込む
    pub async fn load(&self) -> CoordinatorResult<()> {
        let loaded = self.store.load_rules().await?;
        let mut rules = self.rules.write().await;
        *rules = loaded;
        Ok(())
    }

    /// ルールを末尾に追加し、IDを割り当てて永続化する。
    /// 保存に失敗した場合はメモリ上の変更を巻き戻す。
    pub async fn add_rule(&self, mut rule: RoutingRule) -> CoordinatorResult<RoutingRule> {
        rule.id = id::generate_id();

        let mut rules = self.rules.write().await;
        rules.push(rule.clone());
        if let Err(err) = self.store.save_rules(&rules).await {
            rules.pop();
            return Err(err);
        }
        Ok(rule)
    }

    /// ルールをIDで削除して永続化する。見つかったかを返す。
    /// 保存に失敗した場合はメモリ上の変更を巻き戻す。
    pub async fn remove_rule(&self, rule_id: &str) -> CoordinatorResult<bool> {
        let mut rules = self.rules.write().await;
        let Some(index) = rules.iter().position(|r| r.id == rule_id) else {
            return Ok(false);
        };
        let removed = rules.remove(index);
        if let Err(err) = self.store.save_rules(&rules).await {
            rules.insert(index, removed);
            return Err(err);
        }
        Ok(true)
    }

    /// 全ルールを挿入順のコピーで返す
    pub async fn list_rules(&self) -> Vec<RoutingRule> {
        self.rules.read().await.clone()
    }

    /// メッセージの宛先ノードを決定する。
    ///
    /// `target_node` が指定されていればルール評価をバイパスして直接解決する。
    /// それ以外はルールを挿入順に評価し、どれにもマッチしなければ
    /// オンライン全体に対するleast-busyへフォールバックする。
    pub async fn route(&self, msg: &Message) -> CoordinatorResult<Node> {
        if !msg.target_node.is_empty() {
            let node = self
                .registry
                .get(&msg.target_node)
                .await
                .ok_or_else(|| CoordinatorError::TargetNotFound(msg.target_node.clone()))?;
            if node.status == NodeStatus::Offline {
                return Err(CoordinatorError::TargetOffline(msg.target_node.clone()));
            }
            return Ok(node);
        }

        // ルールとノードのスナップショットを取り、評価中は固定する
        let rules = self.rules.read().await.clone();
        let online: Vec<Node> = self
            .registry
            .list()
            .await
            .into_iter()
            .filter(|n| n.status != NodeStatus::Offline)
            .collect();
        if online.is_empty() {
            return Err(CoordinatorError::NoNodesAvailable);
        }

        for rule in &rules {
            if rule.criteria.is_wildcard() {
                return apply_strategy(&rule.strategy, &online);
            }

            let candidates: Vec<&Node> =
                online.iter().filter(|n| rule.criteria.matches(n)).collect();
            if candidates.is_empty() {
                continue;
            }

            if !rule.target.is_empty() {
                if let Some(node) = candidates
                    .iter()
                    .find(|n| n.name == rule.target || n.id == rule.target)
                {
                    return Ok((*node).clone());
                }
                // 明示ターゲットが候補に居ない場合はこのルールを飛ばす。
                // least-busyへ黙ってフォールバックしない。
                debug!(rule_id = %rule.id, target = %rule.target, "rule target missed, skipping rule");
                continue;
            }

            return least_busy_ref(&candidates)
                .map(|n| (*n).clone())
                .ok_or(CoordinatorError::NoNodesAvailable);
        }

        // どのルールにもマッチしなかった
        apply_strategy("", &online)
    }
}

/// 指定戦略でノードを1つ選択する。空集合はエラー。
/// 既定("")と"least-busy"は同一ロジック。
fn apply_strategy(_strategy: &str, nodes: &[Node]) -> CoordinatorResult<Node> {
    nodes
        .iter()
        .min_by_key(|n| status_priority(n.status))
        .cloned()
        .ok_or(CoordinatorError::NoNodesAvailable)
}

/// 候補集合から最も空いているノードを選ぶ。
/// 同率の場合は走査順（= 登録順）の先頭が勝つ。
fn least_busy_ref<'a>(nodes: &[&'a Node]) -> Option<&'a Node> {
    nodes.iter().min_by_key(|n| status_priority(n.status)).copied()
}

/// ステータスの優先度（小さいほど空いている）
fn status_priority(status: NodeStatus) -> u8 {
    match status {
        NodeStatus::Online => 0,
        NodeStatus::Busy => 1,
        NodeStatus::Offline => 2,
    }
}
