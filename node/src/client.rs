//! Coordinator通信クライアント
//!
//! 登録・ハートビート・登録解除のHTTP呼び出し

use std::time::Duration;

use claw_mesh_common::{
    error::{AgentError, AgentResult},
    protocol::{HeartbeatRequest, RegisterRequest, RegisterResponse},
    types::NodeStatus,
};
use reqwest::StatusCode;
use tracing::info;

/// Coordinator呼び出しのタイムアウト
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Coordinatorクライアント
#[derive(Clone)]
pub struct CoordinatorClient {
    coordinator_url: String,
    token: String,
    node_id: Option<String>,
    http_client: reqwest::Client,
}

impl CoordinatorClient {
    /// 新しいCoordinatorクライアントを作成する。
    /// `token` は登録時に提示するトークン（管理トークン）。
    /// 登録後はCoordinatorが発行したノードトークンに差し替わる。
    pub fn new(coordinator_url: String, token: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            coordinator_url,
            token,
            node_id: None,
            http_client,
        }
    }

    /// ノードを登録し、割り当てられたIDとトークンを保存する
    pub async fn register(&mut self, req: RegisterRequest) -> AgentResult<RegisterResponse> {
        let url = format!("{}/api/v1/nodes/register", self.coordinator_url);

        let mut request = self.http_client.post(&url).json(&req);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AgentError::CoordinatorConnection(e.to_string()))?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Registration(format!(
                "registration failed ({status}): {body}"
            )));
        }

        let register_response: RegisterResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Registration(format!("failed to parse response: {e}")))?;

        self.node_id = Some(register_response.node_id.clone());
        if !register_response.token.is_empty() {
            self.token = register_response.token.clone();
        }

        info!(node_id = %register_response.node_id, "registered with coordinator");
        Ok(register_response)
    }

    /// ハートビートを送信する
    pub async fn send_heartbeat(&self, status: NodeStatus) -> AgentResult<()> {
        let Some(node_id) = &self.node_id else {
            return Err(AgentError::Heartbeat("agent is not registered".to_string()));
        };
        let url = format!(
            "{}/api/v1/nodes/{}/heartbeat",
            self.coordinator_url, node_id
        );

        let mut request = self
            .http_client
            .post(&url)
            .json(&HeartbeatRequest { status });
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AgentError::Heartbeat(e.to_string()))?;

        if response.status() != StatusCode::NO_CONTENT {
            return Err(AgentError::Heartbeat(format!(
                "heartbeat returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Coordinatorから登録を解除する
    pub async fn deregister(&self) -> AgentResult<()> {
        let Some(node_id) = &self.node_id else {
            return Ok(());
        };
        let url = format!("{}/api/v1/nodes/{}", self.coordinator_url, node_id);

        let mut request = self.http_client.delete(&url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AgentError::CoordinatorConnection(e.to_string()))?;

        if response.status().as_u16() >= 300 {
            return Err(AgentError::CoordinatorConnection(format!(
                "deregister returned unexpected status {}",
                response.status()
            )));
        }

        info!(node_id = %node_id, "deregistered from coordinator");
        Ok(())
    }

    /// 割り当て済みノードID
    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    /// 現在のトークン（登録後はノードトークン）
    pub fn token(&self) -> &str {
        &self.token
    }

    /// CoordinatorのURL
    pub fn coordinator_url(&self) -> &str {
        &self.coordinator_url
    }
}
