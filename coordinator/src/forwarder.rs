//! メッセージ転送
//!
//! ノードエンドポイントへのHTTP転送。一時的な失敗（ネットワークエラー、
//! 502/503）は指数バックオフ付きで再試行する。

use std::time::Duration;

use claw_mesh_common::types::{Message, MessageResponse, Node};
use futures::TryStreamExt;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::debug;

/// 転送クライアントのリクエストタイムアウト
const FORWARD_TIMEOUT: Duration = Duration::from_secs(30);
/// 再試行間のバックオフ（合計3回の再試行）
const RETRY_BACKOFFS: [Duration; 3] = [
    Duration::from_millis(100),
    Duration::from_millis(200),
    Duration::from_millis(400),
];
/// 成功レスポンス本文の読み取り上限
const MAX_RESPONSE_BYTES: usize = 1 << 20;
/// エラー本文の読み取り上限（文脈用）
const MAX_ERROR_BODY_BYTES: usize = 1024;

/// 転送失敗
#[derive(Debug, Error)]
pub enum ForwardError {
    /// トランスポート層のエラー（再試行対象）
    #[error("transient error forwarding to node {node_id}: {source}")]
    TransientNetwork {
        node_id: String,
        #[source]
        source: reqwest::Error,
    },

    /// 502/503応答（再試行対象）
    #[error("node {node_id} returned transient status {status}")]
    TransientStatus { node_id: String, status: u16 },

    /// その他の非2xx応答（即時失敗）
    #[error("node {node_id} returned status {status}: {body}")]
    Permanent {
        node_id: String,
        status: u16,
        body: String,
    },

    /// レスポンスのデコード失敗
    #[error("decoding response from node {node_id}: {source}")]
    Decode {
        node_id: String,
        #[source]
        source: serde_json::Error,
    },

    /// 再試行を使い切った
    #[error("forwarding failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: usize,
        #[source]
        source: Box<ForwardError>,
    },
}

impl ForwardError {
    /// 再試行対象の失敗か
    fn is_transient(&self) -> bool {
        matches!(
            self,
            ForwardError::TransientNetwork { .. } | ForwardError::TransientStatus { .. }
        )
    }
}

/// メッセージ転送クライアント
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarder {
    /// 既定のタイムアウトを持つ転送クライアントを作成
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }

    /// メッセージをノードへ転送し、レスポンスを返す。
    ///
    /// 試行回数は最大4回（初回+再試行3回）、バックオフは100/200/400ms。
    /// 呼び出し元のFutureがドロップされれば進行中の試行もスリープも中断される。
    pub async fn forward_message(
        &self,
        node: &Node,
        msg: &Message,
        token: &str,
    ) -> Result<MessageResponse, ForwardError> {
        let max_attempts = RETRY_BACKOFFS.len() + 1;
        let mut attempt = 0;

        loop {
            let err = match self.do_forward(node, msg, token).await {
                Ok(resp) => return Ok(resp),
                Err(err) => err,
            };
            if !err.is_transient() {
                return Err(err);
            }

            attempt += 1;
            if attempt >= max_attempts {
                return Err(ForwardError::Exhausted {
                    attempts: max_attempts,
                    source: Box::new(err),
                });
            }

            debug!(
                node_id = %node.id,
                attempt,
                error = %err,
                "transient forward failure, retrying"
            );
            tokio::time::sleep(RETRY_BACKOFFS[attempt - 1]).await;
        }
    }

    /// 1回の転送試行
    async fn do_forward(
        &self,
        node: &Node,
        msg: &Message,
        token: &str,
    ) -> Result<MessageResponse, ForwardError> {
        let url = format!("http://{}/api/v1/messages", node.endpoint);
        let mut request = self.client.post(&url).json(msg);
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| ForwardError::TransientNetwork {
                node_id: node.id.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::BAD_GATEWAY || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ForwardError::TransientStatus {
                node_id: node.id.clone(),
                status: status.as_u16(),
            });
        }

        if status != StatusCode::OK {
            let body = read_limited(response, MAX_ERROR_BODY_BYTES)
                .await
                .unwrap_or_default();
            return Err(ForwardError::Permanent {
                node_id: node.id.clone(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let body = read_limited(response, MAX_RESPONSE_BYTES)
            .await
            .map_err(|source| ForwardError::TransientNetwork {
                node_id: node.id.clone(),
                source,
            })?;
        serde_json::from_slice(&body).map_err(|source| ForwardError::Decode {
            node_id: node.id.clone(),
            source,
        })
    }
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
