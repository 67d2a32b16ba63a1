//! claw-mesh Coordinator
//!
//! ノードレジストリ・ルーティング・転送・ヘルスチェックを束ねる
//! コントロールプレーン本体。

pub mod api;
pub mod dashboard;
pub mod endpoint;
pub mod forwarder;
pub mod health;
pub mod id;
pub mod logging;
pub mod registry;
pub mod router;
pub mod store;

use std::sync::Arc;

use claw_mesh_common::config::CoordinatorConfig;

use crate::{forwarder::Forwarder, registry::NodeRegistry, router::MessageRouter};

/// アプリケーション共有状態
#[derive(Clone)]
pub struct AppState {
    /// ノードレジストリ
    pub registry: NodeRegistry,
    /// ルーティングエンジン
    pub router: MessageRouter,
    /// メッセージ転送クライアント
    pub forwarder: Forwarder,
    /// Coordinator設定
    pub config: Arc<CoordinatorConfig>,
}
