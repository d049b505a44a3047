//! 流式数据解析器
//!
//! # 支持的格式
//!
//! - Responses API SSE（上游）
//! - 帧 SSE（客户端协议）

pub mod frame_sse;
pub mod sse_block;
pub mod upstream;

pub use frame_sse::{parse_frames, ParsedFrames, MALFORMED_FRAME_TYPE};
pub use sse_block::{split_blocks, SseBlock};
pub use upstream::{upstream_event_stream, UpstreamEvent, UpstreamSseParser};
