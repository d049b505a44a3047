//! 后端调用层 Trait 定义
//!
//! 定义报告生成后端的核心接口。
//! 后端层只负责 HTTP 请求/响应和上游事件解码，不包含帧协议逻辑。

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::models::research::ResearchRequest;
use crate::stream::parsers::upstream::UpstreamEvent;

/// 字节流类型
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BackendError>> + Send>>;

/// 上游事件流类型
pub type UpstreamEventStream =
    Pin<Box<dyn Stream<Item = Result<UpstreamEvent, BackendError>> + Send>>;

/// 后端调用结果
pub type BackendResult<T> = Result<T, BackendError>;

/// 后端错误类型
#[derive(Debug, Clone, PartialEq)]
pub struct BackendError {
    /// 错误类型
    pub kind: BackendErrorKind,
    /// 错误消息
    pub message: String,
    /// HTTP 状态码（如果有）
    pub status_code: Option<u16>,
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = self.status_code {
            write!(f, "{} ({}): {}", self.kind, code, self.message)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for BackendError {}

/// 后端错误类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// 认证错误
    AuthenticationError,
    /// 网络错误
    NetworkError,
    /// 请求超时
    Timeout,
    /// 服务端错误
    ServerError,
    /// 请求格式错误
    BadRequest,
    /// 速率限制
    RateLimited,
    /// 上游负载格式错误
    Protocol,
    /// 其他错误
    Other,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthenticationError => write!(f, "AuthenticationError"),
            Self::NetworkError => write!(f, "NetworkError"),
            Self::Timeout => write!(f, "Timeout"),
            Self::ServerError => write!(f, "ServerError"),
            Self::BadRequest => write!(f, "BadRequest"),
            Self::RateLimited => write!(f, "RateLimited"),
            Self::Protocol => write!(f, "Protocol"),
            Self::Other => write!(f, "Other"),
        }
    }
}

impl BackendError {
    /// 创建新的后端错误
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    /// 带 HTTP 状态码创建错误
    pub fn with_status(kind: BackendErrorKind, message: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: Some(status),
        }
    }

    /// 从 HTTP 状态码推断错误类型
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let kind = match status {
            401 | 403 => BackendErrorKind::AuthenticationError,
            400 => BackendErrorKind::BadRequest,
            408 => BackendErrorKind::Timeout,
            429 => BackendErrorKind::RateLimited,
            500..=599 => BackendErrorKind::ServerError,
            _ => BackendErrorKind::Other,
        };
        Self::with_status(kind, message, status)
    }

    /// 上游负载格式错误
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Protocol, message)
    }

    /// 是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            BackendErrorKind::NetworkError
                | BackendErrorKind::Timeout
                | BackendErrorKind::ServerError
                | BackendErrorKind::RateLimited
        )
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            BackendErrorKind::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() {
            BackendErrorKind::NetworkError
        } else if e.is_decode() {
            BackendErrorKind::Protocol
        } else {
            BackendErrorKind::Other
        };

        match e.status() {
            Some(status) => Self::with_status(kind, e.to_string(), status.as_u16()),
            None => Self::new(kind, e.to_string()),
        }
    }
}

/// 报告生成后端 Trait
///
/// 接收结构化请求，返回完整文档（非流式）或上游事件流（流式）。
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    /// 非流式调用
    ///
    /// # 返回
    ///
    /// 生成完成的报告文本
    async fn call(&self, request: &ResearchRequest) -> BackendResult<String>;

    /// 流式调用
    ///
    /// # 返回
    ///
    /// 上游事件流，流中的 `Err` 表示传输或负载故障
    async fn call_stream(&self, request: &ResearchRequest) -> BackendResult<UpstreamEventStream>;

    /// 获取后端名称
    fn name(&self) -> &str;

    /// 凭证是否已配置
    fn is_configured(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(
            BackendError::from_status(401, "x").kind,
            BackendErrorKind::AuthenticationError
        );
        assert_eq!(
            BackendError::from_status(429, "x").kind,
            BackendErrorKind::RateLimited
        );
        assert_eq!(
            BackendError::from_status(503, "x").kind,
            BackendErrorKind::ServerError
        );
        assert_eq!(
            BackendError::from_status(418, "x").kind,
            BackendErrorKind::Other
        );
        assert_eq!(BackendError::from_status(400, "x").status_code, Some(400));
    }

    #[test]
    fn test_display() {
        let err = BackendError::from_status(429, "rate limited");
        assert_eq!(err.to_string(), "RateLimited (429): rate limited");
        let err = BackendError::protocol("bad json");
        assert_eq!(err.to_string(), "Protocol: bad json");
    }

    #[test]
    fn test_is_retryable() {
        assert!(BackendError::from_status(503, "x").is_retryable());
        assert!(!BackendError::from_status(401, "x").is_retryable());
        assert!(!BackendError::protocol("x").is_retryable());
    }
}
