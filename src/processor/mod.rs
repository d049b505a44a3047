//! 请求处理模块
//!
//! 在任何上游调用之前完成请求体解析、字段校验和凭证检查。
//! 流式与非流式接口共用同一套前置检查，错误统一为 `ResearchError`。

pub mod error;

pub use error::ResearchError;

use crate::models::research::{RawResearchRequest, ResearchRequest};

/// 凭证缺失时返回的错误消息
pub const API_KEY_NOT_CONFIGURED: &str = "OpenAI API key not configured";

/// 解析并校验请求体
///
/// # Arguments
/// * `body` - 原始请求体
/// * `credentials_configured` - 后端凭证是否可用
///
/// # Returns
/// 校验通过的请求；字段错误优先于凭证错误
pub fn prepare_request(
    body: &[u8],
    credentials_configured: bool,
) -> Result<ResearchRequest, ResearchError> {
    let raw: RawResearchRequest = serde_json::from_slice(body)
        .map_err(|e| ResearchError::InvalidRequest(format!("Invalid JSON body: {}", e)))?;

    let request = raw
        .validate()
        .map_err(|e| ResearchError::InvalidRequest(e.to_string()))?;

    if !credentials_configured {
        return Err(ResearchError::ConfigError(API_KEY_NOT_CONFIGURED.to_string()));
    }

    Ok(request)
}
