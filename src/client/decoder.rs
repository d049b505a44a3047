//! 客户端帧解码器
//!
//! 持有一个轨道的字节缓冲，把任意切分的 chunk 还原为帧。

use crate::stream::events::{Frame, ReportKind};
use crate::stream::parsers::frame_sse::parse_frames;

#[derive(Debug)]
pub struct FrameDecoder {
    /// 负载缺少 reportKind 时归属的轨道
    track: ReportKind,
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(track: ReportKind) -> Self {
        Self {
            track,
            buffer: Vec::new(),
        }
    }

    pub fn track(&self) -> ReportKind {
        self.track
    }

    /// 尚未构成完整帧的字节数
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// 输入一个 chunk，返回其中完成的帧
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if chunk.is_empty() {
            return Vec::new();
        }
        let parsed = parse_frames(&self.buffer, chunk, self.track);
        self.buffer = parsed.remainder;
        parsed.frames
    }

    /// 流结束，丢弃残留的不完整数据
    pub fn finish(&mut self) {
        if !self.buffer.is_empty() {
            tracing::debug!(
                "[DECODER] 丢弃未完成的数据: track={} bytes={}",
                self.track,
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }
}
