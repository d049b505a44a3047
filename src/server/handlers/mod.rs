//! HTTP 请求处理器

pub mod research;

pub use research::{health, research, research_stream, sse_response};
