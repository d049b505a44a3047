//! HTTP 服务模块
//!
//! 路由：
//! - `POST /api/research/stream` 流式研究（帧 SSE）
//! - `POST /api/research` 非流式研究
//! - `GET /health` 健康检查

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

use crate::backends::traits::ResearchBackend;
use crate::config::Config;
use crate::providers::DeepResearchProvider;
use crate::stream::classifier::UpstreamClassifier;

/// 健康检查路径
pub const HEALTH_PATH: &str = "/health";
/// 非流式研究路径
pub const RESEARCH_PATH: &str = "/api/research";
/// 流式研究路径
pub const RESEARCH_STREAM_PATH: &str = "/api/research/stream";

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    /// 报告生成后端
    pub backend: Arc<dyn ResearchBackend>,
    /// 上游事件分类器
    pub classifier: Arc<UpstreamClassifier>,
    /// 每个中继输出通道的容量
    pub channel_capacity: usize,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn ResearchBackend>,
        classifier: UpstreamClassifier,
        channel_capacity: usize,
    ) -> Self {
        Self {
            backend,
            classifier: Arc::new(classifier),
            channel_capacity,
        }
    }

    /// 从配置构建，使用 Deep Research 后端
    pub fn from_config(config: &Config) -> Self {
        let provider =
            DeepResearchProvider::new(config.upstream.clone(), config.prompts.clone());
        Self::new(
            Arc::new(provider),
            UpstreamClassifier::new(config.relay.ignored_event_families.clone()),
            config.relay.channel_capacity,
        )
    }
}

/// 构建路由
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(handlers::health))
        .route(RESEARCH_PATH, post(handlers::research))
        .route(RESEARCH_STREAM_PATH, post(handlers::research_stream))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

/// 启动 HTTP 服务，直到进程收到 Ctrl-C
pub async fn serve(config: &Config) -> std::io::Result<()> {
    let state = AppState::from_config(config);
    if !state.backend.is_configured() {
        tracing::warn!("[SERVER] 未配置 OpenAI API Key，研究请求将返回 500");
    }

    let app = build_router(state, config.server.max_body_bytes);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("[SERVER] 监听地址: http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("[SERVER] 收到退出信号，正在关闭");
        })
        .await
}
