//! Deep Research Provider (OpenAI Responses API)
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};

use crate::backends::traits::{BackendError, BackendResult, ResearchBackend, UpstreamEventStream};
use crate::config::{PromptsConfig, UpstreamConfig};
use crate::models::research::ResearchRequest;
use crate::stream::parsers::upstream::upstream_event_stream;

/// 响应缺少 output 数组
pub const INVALID_RESPONSE_STRUCTURE: &str = "Invalid response structure from Deep Research API";
/// 响应中没有 message 输出项
pub const NO_MESSAGE_OUTPUT: &str =
    "No message output found in response. Research ended prematurely.";

pub struct DeepResearchProvider {
    pub config: UpstreamConfig,
    pub prompts: PromptsConfig,
    pub client: Client,
}

impl DeepResearchProvider {
    pub fn new(config: UpstreamConfig, prompts: PromptsConfig) -> Self {
        // 研究任务可能持续很久，总超时取自配置
        let client = Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            config,
            prompts,
            client,
        }
    }

    /// 构建完整的 API URL
    /// 无论 base_url 是否带 /v1 都能正确工作
    fn build_url(&self, endpoint: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');

        if base.ends_with("/v1") {
            format!("{}/{}", base, endpoint)
        } else {
            format!("{}/v1/{}", base, endpoint)
        }
    }

    /// 构建 Responses API 请求体
    pub fn build_body(&self, request: &ResearchRequest, stream: bool) -> Value {
        let prompts = self.prompts.for_kind(request.report_kind);
        let message = |role: &str, text: &str| {
            json!({
                "role": role,
                "content": [{ "type": "input_text", "text": text }]
            })
        };

        json!({
            "model": self.config.model,
            "input": [
                message("system", &prompts.system),
                message("developer", &prompts.developer),
                message("user", &request.user_prompt()),
            ],
            "reasoning": { "effort": self.config.reasoning_effort },
            "max_output_tokens": self.config.max_output_tokens,
            "text": { "format": { "type": "text" } },
            "max_tool_calls": self.config.max_tool_calls,
            "tool_choice": "auto",
            "tools": [{
                "type": "web_search_preview",
                "search_context_size": self.config.search_context_size
            }],
            "stream": stream
        })
    }

    /// 发送请求，非 2xx 状态转换为 `BackendError`
    async fn send(
        &self,
        request: &ResearchRequest,
        stream: bool,
    ) -> BackendResult<reqwest::Response> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                BackendError::new(
                    crate::backends::traits::BackendErrorKind::AuthenticationError,
                    "OpenAI API key not configured",
                )
            })?;

        let url = self.build_url("responses");
        tracing::info!(
            "[DEEP_RESEARCH] 发送请求: url={} model={} report_kind={} stream={}",
            url,
            self.config.model,
            request.report_kind,
            stream
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(&self.build_body(request, stream))
            .send()
            .await?;

        let status = resp.status();
        tracing::info!(
            "[DEEP_RESEARCH] 响应状态: status={} report_kind={}",
            status,
            request.report_kind
        );

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = extract_error_message(&body)
                .unwrap_or_else(|| format!("{} {}", status.as_u16(), body.trim()));
            tracing::error!(
                "[DEEP_RESEARCH] 请求失败: status={} message={}",
                status,
                crate::logger::sanitize_log_message(&message)
            );
            return Err(BackendError::from_status(status.as_u16(), message));
        }

        Ok(resp)
    }
}

/// 从错误响应体中提取 `error.message`
pub fn extract_error_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.pointer("/error/message")
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
        .map(|m| m.to_string())
}

/// 从非流式响应中提取报告正文
///
/// 取第一个 `message` 输出项的第一段内容，去掉首尾空白
pub fn extract_report_text(response: &Value) -> BackendResult<String> {
    let output = response
        .get("output")
        .and_then(|o| o.as_array())
        .ok_or_else(|| BackendError::protocol(INVALID_RESPONSE_STRUCTURE))?;

    let content = output
        .iter()
        .find(|item| item.get("type").and_then(|t| t.as_str()) == Some("message"))
        .and_then(|item| item.get("content"))
        .and_then(|c| c.as_array())
        .ok_or_else(|| BackendError::protocol(NO_MESSAGE_OUTPUT))?;

    Ok(content
        .first()
        .and_then(|part| part.get("text"))
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .unwrap_or_default())
}

#[async_trait]
impl ResearchBackend for DeepResearchProvider {
    async fn call(&self, request: &ResearchRequest) -> BackendResult<String> {
        let resp = self.send(request, false).await?;
        let json: Value = resp.json().await?;
        let text = extract_report_text(&json)?;
        tracing::info!(
            "[DEEP_RESEARCH] 报告完成: report_kind={} chars={}",
            request.report_kind,
            text.chars().count()
        );
        Ok(text)
    }

    async fn call_stream(&self, request: &ResearchRequest) -> BackendResult<UpstreamEventStream> {
        let resp = self.send(request, true).await?;
        let bytes = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(BackendError::from));
        Ok(upstream_event_stream(bytes))
    }

    fn name(&self) -> &str {
        "deep_research"
    }

    fn is_configured(&self) -> bool {
        self.config.has_api_key()
    }
}
