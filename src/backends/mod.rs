//! 后端调用层
//!
//! 提供与研究报告生成后端的 HTTP 通信能力。
//! 后端层只负责 HTTP 请求/响应和上游事件解码，不包含任何帧协议逻辑。
//!
//! # 架构设计
//!
//! ```text
//! backends/
//! └── traits.rs          # ResearchBackend trait 与错误定义
//!
//! providers/
//! └── deep_research.rs   # Responses API 实现
//! ```
//!
//! # 职责说明
//!
//! - **只做 HTTP 调用**: 构建 HTTP 请求，发送，接收响应
//! - **不做帧转换**: 分类与帧生成在 stream 层完成
//! - **错误分类**: 将 HTTP 状态码和传输错误映射为 `BackendErrorKind`

pub mod traits;

// 重新导出核心类型
pub use traits::{
    BackendError, BackendErrorKind, BackendResult, ByteStream, ResearchBackend,
    UpstreamEventStream,
};
