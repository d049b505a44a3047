//! 处理错误类型
//!
//! 定义研究请求处理过程中可能发生的错误。
//! `Display` 输出就是返回给调用方的 `error` 文案。

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::backends::traits::BackendError;

/// 处理错误
#[derive(Error, Debug, Clone)]
pub enum ResearchError {
    /// 请求体无效（缺字段、报告类型未知、JSON 损坏）
    #[error("{0}")]
    InvalidRequest(String),

    /// 服务端配置缺失
    #[error("{0}")]
    ConfigError(String),

    /// 上游调用失败
    #[error("{}", backend_message(.0))]
    Backend(BackendError),
}

fn backend_message(error: &BackendError) -> String {
    match error.status_code {
        Some(401) => "Invalid OpenAI API key".to_string(),
        Some(429) => "Rate limited by OpenAI. Please try again in a moment.".to_string(),
        _ => format!("Research failed: {}", error.message),
    }
}

impl From<BackendError> for ResearchError {
    fn from(error: BackendError) -> Self {
        ResearchError::Backend(error)
    }
}

impl ResearchError {
    /// 获取对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ResearchError::InvalidRequest(_) => 400,
            ResearchError::ConfigError(_) => 500,
            ResearchError::Backend(e) => match e.status_code {
                Some(401) => 401,
                Some(429) => 429,
                _ => 500,
            },
        }
    }

    /// 获取错误类型字符串
    pub fn error_type(&self) -> &'static str {
        match self {
            ResearchError::InvalidRequest(_) => "invalid_request",
            ResearchError::ConfigError(_) => "config_error",
            ResearchError::Backend(e) => match e.status_code {
                Some(401) => "authentication_error",
                Some(429) => "rate_limited",
                _ => "backend_error",
            },
        }
    }

    /// 转换为 JSON 错误响应
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "error": self.to_string() })
    }
}

impl IntoResponse for ResearchError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(
                error_type = %self.error_type(),
                error_message = %crate::logger::sanitize_log_message(&self.to_string()),
                "Research request failed"
            );
        }
        (status, Json(self.to_json())).into_response()
    }
}
