//! 帧 SSE 生成器
//!
//! 将 `Frame` 序列化为客户端协议的 SSE 文本。
//!
//! # 格式说明
//!
//! ```text
//! event: delta
//! data: {"reportKind":"profile","textDelta":"Hello "}
//!
//! event: done
//! data: {"reportKind":"profile","message":"Stream completed."}
//! ```

use crate::stream::events::{Frame, FramePayload};

/// 将单个帧编码为 SSE 块（以空行结尾）
///
/// JSON 负载若含换行会拆成多行 `data:`，解码端用 `\n` 重新拼接。
pub fn encode_frame(frame: &Frame) -> String {
    let data = match &frame.payload {
        FramePayload::Activity {
            event_type,
            message,
        } => match event_type {
            Some(event_type) => serde_json::json!({
                "reportKind": frame.report_kind,
                "type": event_type,
                "message": message
            }),
            None => serde_json::json!({
                "reportKind": frame.report_kind,
                "message": message
            }),
        },
        FramePayload::Delta { text_delta } => serde_json::json!({
            "reportKind": frame.report_kind,
            "textDelta": text_delta
        }),
        FramePayload::Error { message } | FramePayload::Done { message } => serde_json::json!({
            "reportKind": frame.report_kind,
            "message": message
        }),
    };

    let data = data.to_string();
    let mut out = format!("event: {}\n", frame.kind().as_str());
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}

/// 帧 SSE 生成器
///
/// 跟踪一个轨道的输出状态，保证终止帧之后不再产生任何输出。
#[derive(Debug, Default)]
pub struct FrameSseGenerator {
    /// 已输出的帧数量
    frames_emitted: usize,
    /// 是否已输出终止帧
    terminated: bool,
}

impl FrameSseGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 将帧转换为 SSE 字符串
    ///
    /// # 返回
    ///
    /// - `Some(String)` - 生成的 SSE 块
    /// - `None` - 轨道已终止，或者是空的 delta
    pub fn generate(&mut self, frame: &Frame) -> Option<String> {
        if self.terminated {
            tracing::warn!(
                "[FRAME_SSE] 轨道 {} 已终止，丢弃 {} 帧",
                frame.report_kind,
                frame.kind().as_str()
            );
            return None;
        }

        if let FramePayload::Delta { text_delta } = &frame.payload {
            if text_delta.is_empty() {
                return None;
            }
        }

        if frame.is_terminal() {
            self.terminated = true;
        }
        self.frames_emitted += 1;
        Some(encode_frame(frame))
    }

    pub fn frames_emitted(&self) -> usize {
        self.frames_emitted
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}
