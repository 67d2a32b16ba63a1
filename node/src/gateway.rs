//! Gatewayクライアント
//!
//! ローカルの推論Gateway（OpenAI互換の /v1/chat/completions）への
//! パススルーを提供する。

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use claw_mesh_common::{
    config::{GATEWAY_TOKEN_ENV, GATEWAY_TOKEN_ENV_LEGACY},
    error::{AgentError, AgentResult},
    protocol::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage},
    types::{Message, MessageResponse},
};
use futures::TryStreamExt;
use reqwest::StatusCode;

/// Gatewayレスポンスの読み取り上限
const MAX_GATEWAY_RESPONSE_BYTES: usize = 1 << 20;
/// ヘルスチェックのTCP接続タイムアウト
const HEALTH_DIAL_TIMEOUT: Duration = Duration::from_secs(2);
/// 既定のリクエストタイムアウト（秒）
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Gateway通信のインターフェース
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// メッセージをGatewayへ転送し、応答を返す
    async fn send_message(&self, msg: &Message) -> AgentResult<MessageResponse>;
    /// Gatewayが到達可能かを返す
    async fn health_check(&self) -> bool;
    /// 保持するリソースを解放する
    async fn close(&self) -> AgentResult<()>;
}

/// HTTP実装のGatewayクライアント
pub struct HttpGatewayClient {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl HttpGatewayClient {
    /// Gatewayクライアントを作成する。`timeout_secs` が0なら既定値を使う。
    pub fn new(endpoint: String, token: String, timeout_secs: u64) -> Self {
        let timeout = if timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            timeout_secs
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            endpoint,
            token,
            client,
        }
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn send_message(&self, msg: &Message) -> AgentResult<MessageResponse> {
        let req_body = ChatCompletionRequest {
            model: "default".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: msg.content.clone(),
            }],
        };

        let url = format!("http://{}/v1/chat/completions", self.endpoint);
        let mut request = self.client.post(&url).json(&req_body);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::Gateway(format!("gateway request failed: {e}")))?;

        let status = response.status();
        let body = read_limited(response, MAX_GATEWAY_RESPONSE_BYTES)
            .await
            .map_err(|e| AgentError::Gateway(format!("reading gateway response: {e}")))?;

        if status == StatusCode::UNAUTHORIZED {
            return Err(AgentError::GatewayAuth(
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }
        if status != StatusCode::OK {
            return Err(AgentError::Gateway(format!(
                "gateway returned {}: {}",
                status.as_u16(),
                String::from_utf8_lossy(&body)
            )));
        }

        let completion: ChatCompletionResponse = serde_json::from_slice(&body)
            .map_err(|e| AgentError::Gateway(format!("decoding gateway response: {e}")))?;

        let content = completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(MessageResponse {
            message_id: msg.id.clone(),
            node_id: String::new(),
            response: content,
        })
    }

    async fn health_check(&self) -> bool {
        matches!(
            tokio::time::timeout(
                HEALTH_DIAL_TIMEOUT,
                tokio::net::TcpStream::connect(&self.endpoint),
            )
            .await,
            Ok(Ok(_))
        )
    }

    async fn close(&self) -> AgentResult<()> {
        Ok(())
    }
}

/// Gatewayトークンを解決する。
/// 優先度: 明示値 > OPENCLAW_GATEWAY_TOKEN > CLAWDBOT_GATEWAY_TOKEN > 検出値
pub fn resolve_gateway_token(explicit: &str, discovered: &str) -> String {
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    if let Ok(token) = env::var(GATEWAY_TOKEN_ENV) {
        if !token.is_empty() {
            return token;
        }
    }
    if let Ok(token) = env::var(GATEWAY_TOKEN_ENV_LEGACY) {
        if !token.is_empty() {
            return token;
        }
    }
    discovered.to_string()
}

/// レスポンス本文を上限付きで読み取る
async fn read_limited(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.try_next().await? {
        let remaining = limit - buf.len();
        if chunk.len() >= remaining {
            buf.extend_from_slice(&chunk[..remaining]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}
