//! 研究接口处理器
//!
//! 流式接口在任何上游调用之前完成校验；校验通过后立即返回 SSE 响应，
//! 上游打开失败等后续错误都以 `error` 帧的形式出现在流中。

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::Stream;

use crate::processor::{prepare_request, ResearchError};
use crate::server::AppState;
use crate::stream::pipeline::{relay_stream, spawn_relay, sse_body_stream, Relay};

/// 构建 SSE 响应
pub fn sse_response<S>(stream: S) -> Response
where
    S: Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-transform"),
    );
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    (headers, Body::from_stream(stream)).into_response()
}

/// `POST /api/research/stream`
pub async fn research_stream(State(state): State<AppState>, body: Bytes) -> Response {
    let request = match prepare_request(&body, state.backend.is_configured()) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("[RESEARCH] 拒绝流式请求: {}", e);
            return e.into_response();
        }
    };

    tracing::info!(
        "[RESEARCH] 开始流式研究: backend={} report_kind={} company={}",
        state.backend.name(),
        request.report_kind,
        request.company_name
    );

    let relay = Relay::new(request.report_kind, state.classifier.clone());
    let backend = state.backend.clone();
    let open = async move { backend.call_stream(&request).await };
    let rx = spawn_relay(relay_stream(relay, open), state.channel_capacity);

    sse_response(sse_body_stream(rx))
}

/// `POST /api/research`
pub async fn research(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ResearchError> {
    let request = prepare_request(&body, state.backend.is_configured())?;

    tracing::info!(
        "[RESEARCH] 开始非流式研究: backend={} report_kind={} company={}",
        state.backend.name(),
        request.report_kind,
        request.company_name
    );

    let text = state.backend.call(&request).await?;
    let mut response = serde_json::Map::new();
    response.insert(
        request.report_kind.response_key(),
        serde_json::Value::String(text),
    );
    Ok(Json(serde_json::Value::Object(response)))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
