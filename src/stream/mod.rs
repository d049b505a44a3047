//! 流式处理层
//!
//! 提供研究报告中继所需的流式数据处理能力，包括：
//! - 帧类型定义 (events)
//! - 上游事件分类 (classifier)
//! - 流格式解析 (parsers)
//! - 客户端帧生成 (generators)
//! - 单轨道中继管道 (pipeline)
//!
//! # 架构设计
//!
//! ```text
//! 上游 SSE ──> [UpstreamSseParser] ──> UpstreamEvent ──> [UpstreamClassifier] ──> UpstreamSignal
//!          ──> [Relay] ──> Frame ──> [FrameSseGenerator] ──> 客户端 SSE
//!
//! 客户端 SSE ──> [parse_frames] ──> Frame ──> Sequencer
//! ```
//!
//! # 模块结构
//!
//! - `events`: 帧与报告轨道定义 (`Frame`, `ReportKind`)
//! - `classifier`: 上游事件类型到信号的全映射
//! - `parsers`: 流格式解析器
//!   - `sse_block`: 通用 SSE 块切分
//!   - `upstream`: Responses API 事件解析
//!   - `frame_sse`: 客户端帧解析
//! - `generators`: 客户端帧 SSE 生成器
//! - `pipeline`: 中继状态机与输出通道

pub mod classifier;
pub mod events;
pub mod generators;
pub mod parsers;
pub mod pipeline;

// 重新导出核心类型
pub use classifier::{StructuralMarker, UpstreamClassifier, UpstreamSignal};
pub use events::{Frame, FrameKind, FramePayload, ReportKind};
pub use generators::{encode_frame, FrameSseGenerator};
pub use parsers::{parse_frames, ParsedFrames, UpstreamEvent, UpstreamSseParser};
pub use pipeline::{relay_stream, spawn_relay, sse_body_stream, Relay, RelayStep};
