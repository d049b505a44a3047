//! SSE 流生成器
//!
//! 将 `Frame` 转换为客户端协议的 SSE 格式。
//!
//! # 支持的格式
//!
//! - 帧 SSE (event: activity|delta|error|done\ndata: {...})

pub mod frame_sse;

pub use frame_sse::{encode_frame, FrameSseGenerator};
