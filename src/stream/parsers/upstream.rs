//! 上游 SSE 流解析器
//!
//! 解析 Responses API 的 Server-Sent Events 流，输出 `UpstreamEvent`。
//! 只提取中继需要的字段：事件类型、文本增量、错误消息。

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::backends::traits::{BackendError, UpstreamEventStream};
use crate::stream::parsers::sse_block::{split_blocks, SseBlock};

/// 上游事件
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamEvent {
    /// 原始事件类型，例如 `response.output_text.delta`
    pub event_type: String,
    /// 文本增量（仅 delta 类事件）
    pub delta: Option<String>,
    /// 上游声明的错误消息
    pub error_message: Option<String>,
}

impl UpstreamEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    pub fn with_delta(mut self, delta: impl Into<String>) -> Self {
        self.delta = Some(delta.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    /// 从上游 JSON 负载构建事件
    ///
    /// 事件类型优先取负载中的 `type` 字段，其次取 SSE 的 `event:` 名称
    pub fn from_json(json: &Value, event_name: Option<&str>) -> Self {
        let event_type = json
            .get("type")
            .and_then(|t| t.as_str())
            .or(event_name)
            .unwrap_or("")
            .to_string();

        let delta = json
            .get("delta")
            .and_then(|d| d.as_str())
            .map(|s| s.to_string());

        // 错误消息可能出现在 error.message、response.error.message 或顶层 message
        let error_message = json
            .pointer("/error/message")
            .or_else(|| json.pointer("/response/error/message"))
            .or_else(|| json.get("message"))
            .and_then(|m| m.as_str())
            .map(|s| s.to_string());

        Self {
            event_type,
            delta,
            error_message,
        }
    }
}

/// 上游 SSE 解析器
///
/// 按块缓冲字节，每个完整块产生一个事件。
#[derive(Debug, Default)]
pub struct UpstreamSseParser {
    buffer: Vec<u8>,
}

impl UpstreamSseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一段字节
    ///
    /// 负载 JSON 损坏时返回 `Err`，由中继转换为终止错误帧
    pub fn process(&mut self, bytes: &[u8]) -> Vec<Result<UpstreamEvent, BackendError>> {
        self.buffer.extend_from_slice(bytes);
        let (blocks, consumed) = split_blocks(&self.buffer);
        self.buffer.drain(..consumed);

        blocks
            .iter()
            .filter_map(|block| Self::parse_block(block))
            .collect()
    }

    /// 完成解析
    ///
    /// 流结束时未以空行结尾的最后一个块仍按完整块处理
    pub fn finish(&mut self) -> Vec<Result<UpstreamEvent, BackendError>> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest);
        if text.trim().is_empty() {
            return Vec::new();
        }
        Self::parse_block(&SseBlock::parse(&text)).into_iter().collect()
    }

    fn parse_block(block: &SseBlock) -> Option<Result<UpstreamEvent, BackendError>> {
        let data = block.data.as_deref()?.trim();
        if data.is_empty() || data == "[DONE]" {
            return None;
        }

        match serde_json::from_str::<Value>(data) {
            Ok(json) => Some(Ok(UpstreamEvent::from_json(&json, block.event.as_deref()))),
            Err(e) => {
                tracing::warn!("[UPSTREAM_SSE] 解析 JSON 失败: {} - data: {}", e, data);
                Some(Err(BackendError::protocol(format!(
                    "Malformed upstream payload: {}",
                    e
                ))))
            }
        }
    }
}

/// 将上游字节流转换为事件流
///
/// 字节流中的错误原样转发后结束
pub fn upstream_event_stream<S>(byte_stream: S) -> UpstreamEventStream
where
    S: Stream<Item = Result<Bytes, BackendError>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut parser = UpstreamSseParser::new();
        let mut byte_stream = std::pin::pin!(byte_stream);

        while let Some(result) = byte_stream.next().await {
            match result {
                Ok(bytes) => {
                    for event in parser.process(&bytes) {
                        yield event;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        for event in parser.finish() {
            yield event;
        }
    })
}
