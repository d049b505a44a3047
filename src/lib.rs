//! 深度研究报告流式中继
//!
//! - 服务端：把上游 Responses API 的事件流转换为统一的帧协议（`server`、`stream`）
//! - 客户端：解码帧流，依次生成 profile 和 memo 两份文档（`client`）

pub mod backends;
pub mod client;
pub mod config;
pub mod logger;
pub mod models;
pub mod processor;
pub mod providers;
pub mod resilience;
pub mod server;
pub mod stream;

pub use client::{ResearchClient, Sequencer, Session, SessionError};
pub use config::Config;
pub use models::{CompanyInfo, ResearchRequest};
pub use stream::events::{Frame, FrameKind, FramePayload, ReportKind};
