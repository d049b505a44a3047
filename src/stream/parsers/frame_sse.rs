//! 帧 SSE 解析器
//!
//! 将客户端协议的字节流还原为 `Frame`，是 `generators::frame_sse` 的逆过程。
//!
//! 解析是纯函数：`(已缓冲字节, 新字节) -> (帧列表, 剩余字节)`，
//! 不依赖任何传输层，可以对任意切分方式做属性测试。

use crate::stream::events::{Frame, FrameKind, FramePayload, ReportKind, WirePayload};
use crate::stream::parsers::sse_block::{split_blocks, SseBlock};

/// JSON 无法解析时 activity 帧使用的类型标记
pub const MALFORMED_FRAME_TYPE: &str = "malformed";

/// 一次解析的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFrames {
    /// 完整的帧，按线上顺序排列
    pub frames: Vec<Frame>,
    /// 尚未构成完整帧的字节
    pub remainder: Vec<u8>,
}

/// 解析字节为帧
///
/// # 参数
///
/// * `buffered` - 上一次解析留下的剩余字节
/// * `new_bytes` - 新到达的字节（可以为空，可以在任意位置截断）
/// * `track` - 负载缺少 `reportKind` 时归属的轨道
pub fn parse_frames(buffered: &[u8], new_bytes: &[u8], track: ReportKind) -> ParsedFrames {
    let mut buf = Vec::with_capacity(buffered.len() + new_bytes.len());
    buf.extend_from_slice(buffered);
    buf.extend_from_slice(new_bytes);

    let (blocks, consumed) = split_blocks(&buf);
    let frames = blocks
        .iter()
        .filter_map(|block| decode_block(block, track))
        .collect();

    ParsedFrames {
        frames,
        remainder: buf.split_off(consumed),
    }
}

/// 将单个 SSE 块转换为帧
///
/// 没有 `data` 行的块不产生帧；JSON 损坏的块降级为 activity 帧，
/// 原始字符串作为消息保留，不影响后续帧。
pub fn decode_block(block: &SseBlock, track: ReportKind) -> Option<Frame> {
    let data = block.data.as_deref()?;

    let payload: WirePayload = match serde_json::from_str(data.trim()) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("[FRAME_SSE] 解析帧 JSON 失败: {} - data: {}", e, data);
            return Some(Frame {
                report_kind: track,
                payload: FramePayload::Activity {
                    event_type: Some(MALFORMED_FRAME_TYPE.to_string()),
                    message: data.to_string(),
                },
            });
        }
    };

    let report_kind = payload.report_kind.unwrap_or(track);
    let payload = match FrameKind::from_event_name(block.event_name()) {
        Some(FrameKind::Activity) => FramePayload::Activity {
            event_type: payload.event_type,
            message: payload.message.unwrap_or_default(),
        },
        Some(FrameKind::Delta) => FramePayload::Delta {
            text_delta: payload.text_delta.unwrap_or_default(),
        },
        Some(FrameKind::Error) => FramePayload::Error {
            message: payload.message.unwrap_or_else(|| {
                format!("Error while streaming {} report.", report_kind.label())
            }),
        },
        Some(FrameKind::Done) => FramePayload::Done {
            message: payload.message.unwrap_or_default(),
        },
        // 未知事件名保留为带原始名称的 activity
        None => FramePayload::Activity {
            event_type: Some(block.event_name().to_string()),
            message: payload.message.unwrap_or_else(|| data.to_string()),
        },
    };

    Some(Frame {
        report_kind,
        payload,
    })
}


// ============================================================================
// 属性测试
// ============================================================================
