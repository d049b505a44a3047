//! 超时控制实现
//!
//! 提供轨道启动超时、流式响应空闲超时和取消功能

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// 超时配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimeoutConfig {
    /// 请求超时（毫秒），0 表示无超时
    pub request_timeout_ms: u64,
    /// 流式响应空闲超时（毫秒），0 表示无超时
    /// 当流式响应中两个 chunk 之间的间隔超过此值时触发超时
    pub stream_idle_timeout_ms: u64,
}

impl TimeoutConfig {
    pub fn new(request_timeout_ms: u64, stream_idle_timeout_ms: u64) -> Self {
        Self {
            request_timeout_ms,
            stream_idle_timeout_ms,
        }
    }

    /// 从秒数创建
    pub fn from_secs(request_timeout_secs: u64, stream_idle_timeout_secs: u64) -> Self {
        Self::new(
            request_timeout_secs.saturating_mul(1000),
            stream_idle_timeout_secs.saturating_mul(1000),
        )
    }

    /// 创建无超时的配置
    pub fn no_timeout() -> Self {
        Self::default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        (self.stream_idle_timeout_ms > 0)
            .then(|| Duration::from_millis(self.stream_idle_timeout_ms))
    }
}

/// 超时错误
#[derive(Debug, Clone, PartialEq)]
pub enum TimeoutError {
    /// 请求超时
    RequestTimeout { timeout_ms: u64, elapsed_ms: u64 },
    /// 流式响应空闲超时
    StreamIdleTimeout { timeout_ms: u64 },
    /// 操作被取消
    Cancelled,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::RequestTimeout {
                timeout_ms,
                elapsed_ms,
            } => {
                write!(
                    f,
                    "请求超时: 配置 {}ms, 已耗时 {}ms",
                    timeout_ms, elapsed_ms
                )
            }
            TimeoutError::StreamIdleTimeout { timeout_ms } => {
                write!(f, "流式响应空闲超时: 配置 {}ms", timeout_ms)
            }
            TimeoutError::Cancelled => write!(f, "操作已取消"),
        }
    }
}

impl std::error::Error for TimeoutError {}

/// 取消令牌
///
/// 克隆共享同一取消状态
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取消操作
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 等待取消信号
    pub async fn cancelled(&self) {
        // 先注册等待者再检查标志，避免错过 cancel() 的通知
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// 超时控制器
#[derive(Debug, Clone, Default)]
pub struct TimeoutController {
    config: TimeoutConfig,
}

impl TimeoutController {
    pub fn new(config: TimeoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// 带请求超时和取消执行异步操作
    pub async fn execute_with_timeout_and_cancel<F, T>(
        &self,
        operation: F,
        cancel_token: &CancellationToken,
    ) -> Result<T, TimeoutError>
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();

        if cancel_token.is_cancelled() {
            return Err(TimeoutError::Cancelled);
        }

        match self.config.request_timeout() {
            Some(timeout) => {
                tokio::select! {
                    result = tokio::time::timeout(timeout, operation) => {
                        result.map_err(|_| TimeoutError::RequestTimeout {
                            timeout_ms: self.config.request_timeout_ms,
                            elapsed_ms: start.elapsed().as_millis() as u64,
                        })
                    }
                    _ = cancel_token.cancelled() => Err(TimeoutError::Cancelled),
                }
            }
            None => {
                tokio::select! {
                    result = operation => Ok(result),
                    _ = cancel_token.cancelled() => Err(TimeoutError::Cancelled),
                }
            }
        }
    }

    /// 读取流的下一项，受空闲超时和取消约束
    ///
    /// 流结束时返回 `Ok(None)`
    pub async fn next_with_idle_timeout<S>(
        &self,
        stream: &mut S,
        cancel_token: &CancellationToken,
    ) -> Result<Option<S::Item>, TimeoutError>
    where
        S: Stream + Unpin,
    {
        if cancel_token.is_cancelled() {
            return Err(TimeoutError::Cancelled);
        }

        match self.config.stream_idle_timeout() {
            Some(idle) => {
                tokio::select! {
                    result = tokio::time::timeout(idle, stream.next()) => {
                        result.map_err(|_| TimeoutError::StreamIdleTimeout {
                            timeout_ms: self.config.stream_idle_timeout_ms,
                        })
                    }
                    _ = cancel_token.cancelled() => Err(TimeoutError::Cancelled),
                }
            }
            None => {
                tokio::select! {
                    item = stream.next() => Ok(item),
                    _ = cancel_token.cancelled() => Err(TimeoutError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_timeout_config_no_timeout() {
        let config = TimeoutConfig::no_timeout();
        assert!(config.request_timeout().is_none());
        assert!(config.stream_idle_timeout().is_none());
    }

    #[test]
    fn test_timeout_config_from_secs() {
        let config = TimeoutConfig::from_secs(5, 1);
        assert_eq!(config.request_timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(
            config.stream_idle_timeout(),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_timeout_error_display() {
        let err = TimeoutError::RequestTimeout {
            timeout_ms: 5000,
            elapsed_ms: 5100,
        };
        assert!(err.to_string().contains("5000"));
        assert!(err.to_string().contains("5100"));

        let err = TimeoutError::StreamIdleTimeout { timeout_ms: 1000 };
        assert!(err.to_string().contains("1000"));

        assert!(TimeoutError::Cancelled.to_string().contains("取消"));
    }

    #[tokio::test]
    async fn test_execute_with_timeout_success() {
        let controller = TimeoutController::new(TimeoutConfig::new(1000, 0));
        let token = CancellationToken::new();
        let result = controller
            .execute_with_timeout_and_cancel(async { 42 }, &token)
            .await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_execute_with_timeout_timeout() {
        let controller = TimeoutController::new(TimeoutConfig::new(50, 0));
        let token = CancellationToken::new();

        let result: Result<(), TimeoutError> = controller
            .execute_with_timeout_and_cancel(
                tokio::time::sleep(Duration::from_millis(500)),
                &token,
            )
            .await;

        match result {
            Err(TimeoutError::RequestTimeout { timeout_ms, .. }) => assert_eq!(timeout_ms, 50),
            other => panic!("Expected RequestTimeout error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_with_cancel() {
        let controller = TimeoutController::new(TimeoutConfig::new(5000, 0));
        let token = CancellationToken::new();

        let token_clone = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token_clone.cancel();
        });

        let result: Result<(), TimeoutError> = controller
            .execute_with_timeout_and_cancel(
                tokio::time::sleep(Duration::from_millis(5000)),
                &token,
            )
            .await;

        assert_eq!(result.unwrap_err(), TimeoutError::Cancelled);
    }

    #[tokio::test]
    async fn test_execute_already_cancelled() {
        let controller = TimeoutController::default();
        let token = CancellationToken::new();
        token.cancel();

        let result: Result<i32, TimeoutError> = controller
            .execute_with_timeout_and_cancel(async { 42 }, &token)
            .await;
        assert_eq!(result.unwrap_err(), TimeoutError::Cancelled);
    }

    #[tokio::test]
    async fn test_cancelled_returns_after_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        // 已取消时立即返回
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_next_with_idle_timeout_yields_items() {
        let controller = TimeoutController::new(TimeoutConfig::new(0, 1000));
        let token = CancellationToken::new();
        let mut stream = futures::stream::iter(vec![1, 2]);

        assert_eq!(
            controller.next_with_idle_timeout(&mut stream, &token).await,
            Ok(Some(1))
        );
        assert_eq!(
            controller.next_with_idle_timeout(&mut stream, &token).await,
            Ok(Some(2))
        );
        assert_eq!(
            controller.next_with_idle_timeout(&mut stream, &token).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn test_next_with_idle_timeout_stalls() {
        let controller = TimeoutController::new(TimeoutConfig::new(0, 50));
        let token = CancellationToken::new();
        let mut stream = futures::stream::pending::<u8>();

        assert_eq!(
            controller.next_with_idle_timeout(&mut stream, &token).await,
            Err(TimeoutError::StreamIdleTimeout { timeout_ms: 50 })
        );
    }

    #[tokio::test]
    async fn test_next_with_idle_timeout_cancelled() {
        let controller = TimeoutController::default();
        let token = CancellationToken::new();
        let mut stream = futures::stream::pending::<u8>();

        let token_clone = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token_clone.cancel();
        });

        assert_eq!(
            controller.next_with_idle_timeout(&mut stream, &token).await,
            Err(TimeoutError::Cancelled)
        );
    }
}
