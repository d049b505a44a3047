//! 轨道字节源
//!
//! 为一个轨道发起请求并返回响应体字节流。
//! HTTP 实现调用中继服务；测试使用内存实现。

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;

use crate::client::error::SessionError;
use crate::models::research::ResearchRequest;

/// 响应体字节流
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Bytes, SessionError>> + Send>>;

#[async_trait]
pub trait TrackSource: Send + Sync {
    /// 发起单个轨道请求
    ///
    /// 非 2xx 响应或传输错误返回 `SessionError::StartFailed`
    async fn open(&self, request: &ResearchRequest) -> Result<ChunkStream, SessionError>;
}

/// 通过 HTTP 调用中继服务
pub struct HttpTrackSource {
    client: Client,
    endpoint: String,
}

impl HttpTrackSource {
    pub fn new(server_url: &str) -> Self {
        // 研究流可能持续很久，不设置总超时
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: format!("{}/api/research/stream", server_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// 从错误响应体中取出 `error` 字段
pub fn start_error_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get("error")
        .and_then(|e| e.as_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_string())
}

#[async_trait]
impl TrackSource for HttpTrackSource {
    async fn open(&self, request: &ResearchRequest) -> Result<ChunkStream, SessionError> {
        let report_kind = request.report_kind;
        tracing::info!(
            "[CLIENT] 发起轨道请求: url={} report_kind={}",
            self.endpoint,
            report_kind
        );

        let resp = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("[CLIENT] 请求失败: report_kind={} error={}", report_kind, e);
                SessionError::start_failed(report_kind)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(
                "[CLIENT] 轨道启动失败: report_kind={} status={}",
                report_kind,
                status
            );
            return Err(match start_error_message(&body) {
                Some(message) => SessionError::StartFailed {
                    report_kind,
                    message,
                },
                None => SessionError::start_failed(report_kind),
            });
        }

        let stream = resp.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| SessionError::Stream {
                report_kind,
                message: e.to_string(),
            })
        });
        Ok(Box::pin(stream))
    }
}
