//! 流式中继管道
//!
//! 封装单个轨道的完整中继流程：打开上游流 → 分类 → 生成帧 → 写入输出通道
//!
//! # 使用示例
//!
//! ```ignore
//! use research_relay_lib::stream::pipeline::{relay_stream, spawn_relay, Relay};
//!
//! let relay = Relay::new(ReportKind::Profile, classifier);
//! let frames = relay_stream(relay, async move { backend.call_stream(&request).await });
//! let rx = spawn_relay(frames, 64);
//! let body = Body::from_stream(sse_body_stream(rx));
//! ```
//!
//! # 失败语义
//!
//! - 开始帧在上游确认之前立即发出
//! - 上游打开失败、传输错误、负载损坏都转换为唯一的 `error` 帧
//! - 无论成功、失败还是上游耗尽，输出通道最终都会关闭

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::backends::traits::{BackendError, BackendResult, UpstreamEventStream};
use crate::stream::classifier::{UpstreamClassifier, UpstreamSignal};
use crate::stream::events::{Frame, ReportKind};
use crate::stream::generators::FrameSseGenerator;
use crate::stream::parsers::upstream::UpstreamEvent;

/// 开始帧的类型标记
pub const START_EVENT_TYPE: &str = "start";
/// 上游未提供错误消息时的兜底文案
pub const UNKNOWN_MODEL_ERROR: &str = "Unknown error from model.";
/// done 帧的消息
pub const STREAM_COMPLETED: &str = "Stream completed.";

/// 处理单个上游事件的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStep {
    /// 需要发出的帧
    pub frames: Vec<Frame>,
    /// 是否终止中继
    pub terminal: bool,
}

/// 单轨道中继状态机
#[derive(Debug)]
pub struct Relay {
    /// 报告轨道
    report_kind: ReportKind,
    /// 上游事件分类器
    classifier: Arc<UpstreamClassifier>,
    /// 已处理的上游事件数
    events_seen: usize,
    /// 已发出的 delta 帧数
    deltas_emitted: usize,
    /// 被忽略的上游事件数
    events_ignored: usize,
}

impl Relay {
    pub fn new(report_kind: ReportKind, classifier: Arc<UpstreamClassifier>) -> Self {
        Self {
            report_kind,
            classifier,
            events_seen: 0,
            deltas_emitted: 0,
            events_ignored: 0,
        }
    }

    pub fn report_kind(&self) -> ReportKind {
        self.report_kind
    }

    /// 立即发出的开始帧
    pub fn start_frame(&self) -> Frame {
        let message = match self.report_kind {
            ReportKind::Profile => "🔎 Starting CEO research…",
            ReportKind::Memo => "📊 Starting investment memo research…",
        };
        Frame::activity(self.report_kind, START_EVENT_TYPE, message)
    }

    /// 处理单个上游事件
    pub fn process_event(&mut self, event: &UpstreamEvent) -> RelayStep {
        self.events_seen += 1;
        let signal = self.classifier.classify_event(event);
        let mut step = RelayStep::default();

        match &signal {
            UpstreamSignal::Ignored => {
                self.events_ignored += 1;
            }
            UpstreamSignal::TextDelta { fragment } => {
                // 空片段直接丢弃
                if !fragment.is_empty() {
                    self.deltas_emitted += 1;
                    step.frames.push(Frame::delta(self.report_kind, fragment.clone()));
                }
            }
            UpstreamSignal::LifecycleError { message } => {
                if let Some(activity) = signal.activity_message(self.report_kind) {
                    step.frames.push(Frame::activity(
                        self.report_kind,
                        event.event_type.clone(),
                        activity,
                    ));
                }
                let message = message.as_deref().unwrap_or(UNKNOWN_MODEL_ERROR);
                tracing::warn!(
                    "[RELAY] 上游报告错误: report_kind={} type={} message={}",
                    self.report_kind,
                    event.event_type,
                    message
                );
                step.frames.push(Frame::error(self.report_kind, message));
                step.terminal = true;
            }
            _ => {
                if let Some(activity) = signal.activity_message(self.report_kind) {
                    step.frames.push(Frame::activity(
                        self.report_kind,
                        event.event_type.clone(),
                        activity,
                    ));
                }
            }
        }

        step
    }

    /// 上游耗尽后的终止帧
    pub fn finish(&self) -> Frame {
        tracing::info!(
            "[RELAY] 轨道完成: report_kind={} events={} deltas={} ignored={}",
            self.report_kind,
            self.events_seen,
            self.deltas_emitted,
            self.events_ignored
        );
        Frame::done(self.report_kind, STREAM_COMPLETED)
    }

    /// 中继级故障转换为终止错误帧
    pub fn fail(&self, error: &BackendError) -> Frame {
        tracing::error!(
            "[RELAY] 上游流失败: report_kind={} events={} error={}",
            self.report_kind,
            self.events_seen,
            crate::logger::sanitize_log_message(&error.to_string())
        );
        let message = if error.message.is_empty() {
            "Unexpected error while streaming research response.".to_string()
        } else {
            error.message.clone()
        };
        Frame::error(self.report_kind, message)
    }

    pub fn deltas_emitted(&self) -> usize {
        self.deltas_emitted
    }
}

/// 创建中继帧流
///
/// `open` 在开始帧发出之后才被轮询，打开失败同样转换为错误帧。
/// 帧流在终止帧之后结束，不会再读取上游。
pub fn relay_stream<F>(mut relay: Relay, open: F) -> impl Stream<Item = Frame> + Send
where
    F: Future<Output = BackendResult<UpstreamEventStream>> + Send + 'static,
{
    async_stream::stream! {
        yield relay.start_frame();

        let mut upstream = match open.await {
            Ok(upstream) => upstream,
            Err(e) => {
                yield relay.fail(&e);
                return;
            }
        };

        while let Some(item) = upstream.next().await {
            match item {
                Ok(event) => {
                    let step = relay.process_event(&event);
                    for frame in step.frames {
                        yield frame;
                    }
                    if step.terminal {
                        return;
                    }
                }
                Err(e) => {
                    yield relay.fail(&e);
                    return;
                }
            }
        }

        yield relay.finish();
    }
}

/// 在独立任务中运行中继，把编码后的帧写入输出通道
///
/// 返回通道接收端；任务结束时发送端被释放，通道随之关闭。
/// 接收端被丢弃（客户端断开）时停止读取上游。
pub fn spawn_relay<S>(frames: S, capacity: usize) -> mpsc::Receiver<Bytes>
where
    S: Stream<Item = Frame> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let mut frames = std::pin::pin!(frames);
        let mut generator = FrameSseGenerator::new();

        loop {
            // 上游长时间静默时也要及时发现客户端断开
            let frame = tokio::select! {
                frame = frames.next() => frame,
                _ = tx.closed() => {
                    tracing::debug!("[RELAY] 客户端已断开，停止读取上游");
                    break;
                }
            };
            let Some(frame) = frame else {
                break;
            };
            let Some(sse) = generator.generate(&frame) else {
                continue;
            };
            if tx.send(Bytes::from(sse)).await.is_err() {
                tracing::debug!(
                    "[RELAY] 输出通道已关闭，停止中继: report_kind={}",
                    frame.report_kind
                );
                break;
            }
            if generator.is_terminated() {
                break;
            }
        }
    });

    rx
}

/// 将输出通道转换为 HTTP 响应体流
pub fn sse_body_stream(
    mut rx: mpsc::Receiver<Bytes>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        while let Some(chunk) = rx.recv().await {
            yield Ok::<Bytes, Infallible>(chunk);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::traits::BackendErrorKind;
    use crate::stream::events::{FrameKind, FramePayload};
    use crate::stream::parsers::frame_sse::parse_frames;

    fn classifier() -> Arc<UpstreamClassifier> {
        Arc::new(UpstreamClassifier::default())
    }

    fn upstream(events: Vec<Result<UpstreamEvent, BackendError>>) -> UpstreamEventStream {
        Box::pin(futures::stream::iter(events))
    }

    async fn collect(
        kind: ReportKind,
        events: Vec<Result<UpstreamEvent, BackendError>>,
    ) -> Vec<Frame> {
        let relay = Relay::new(kind, classifier());
        let open = async move { Ok(upstream(events)) };
        relay_stream(relay, open).collect().await
    }

    fn deltas(frames: &[Frame]) -> String {
        frames
            .iter()
            .filter_map(|f| match &f.payload {
                FramePayload::Delta { text_delta } => Some(text_delta.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_happy_path() {
        let frames = collect(
            ReportKind::Profile,
            vec![
                Ok(UpstreamEvent::new("response.created")),
                Ok(UpstreamEvent::new("response.output_text.delta").with_delta("Hello ")),
                Ok(UpstreamEvent::new("response.output_text.delta").with_delta("world")),
                Ok(UpstreamEvent::new("response.output_text.delta").with_delta(".")),
                Ok(UpstreamEvent::new("response.completed")),
            ],
        )
        .await;

        assert_eq!(
            frames[0],
            Frame::activity(ReportKind::Profile, START_EVENT_TYPE, "🔎 Starting CEO research…")
        );
        assert_eq!(deltas(&frames), "Hello world.");
        assert_eq!(frames.iter().filter(|f| f.kind() == FrameKind::Done).count(), 1);
        assert_eq!(
            frames.last(),
            Some(&Frame::done(ReportKind::Profile, STREAM_COMPLETED))
        );
        // completed 产生一条活动消息，位于 done 之前
        assert_eq!(
            frames[frames.len() - 2],
            Frame::activity(
                ReportKind::Profile,
                "response.completed",
                "✅ CEO profile research completed."
            )
        );
    }

    #[tokio::test]
    async fn test_upstream_error_mid_stream() {
        let frames = collect(
            ReportKind::Profile,
            vec![
                Ok(UpstreamEvent::new("response.output_text.delta").with_delta("Partial")),
                Ok(UpstreamEvent::new("response.error").with_error("rate limited")),
                Ok(UpstreamEvent::new("response.output_text.delta").with_delta("never")),
            ],
        )
        .await;

        assert_eq!(deltas(&frames), "Partial");
        assert_eq!(
            frames.last(),
            Some(&Frame::error(ReportKind::Profile, "rate limited"))
        );
        assert!(frames.iter().all(|f| f.kind() != FrameKind::Done));
    }

    #[tokio::test]
    async fn test_upstream_error_without_message() {
        let frames = collect(
            ReportKind::Memo,
            vec![Ok(UpstreamEvent::new("response.error"))],
        )
        .await;
        assert_eq!(
            frames.last(),
            Some(&Frame::error(ReportKind::Memo, UNKNOWN_MODEL_ERROR))
        );
    }

    #[tokio::test]
    async fn test_empty_delta_suppressed() {
        let frames = collect(
            ReportKind::Memo,
            vec![Ok(UpstreamEvent::new("response.output_text.delta").with_delta(""))],
        )
        .await;
        assert!(frames.iter().all(|f| f.kind() != FrameKind::Delta));
        assert_eq!(deltas(&frames), "");
    }

    #[tokio::test]
    async fn test_unknown_event_yields_one_activity() {
        let frames = collect(
            ReportKind::Memo,
            vec![Ok(UpstreamEvent::new("response.something_new"))],
        )
        .await;
        // start + unknown activity + done
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[1],
            Frame::activity(
                ReportKind::Memo,
                "response.something_new",
                "ℹ️ Event: response.something_new"
            )
        );
    }

    #[tokio::test]
    async fn test_ignored_events_produce_nothing() {
        let frames = collect(
            ReportKind::Memo,
            vec![
                Ok(UpstreamEvent::new("response.file_search_call.searching")),
                Ok(UpstreamEvent::new("response.mcp_call.in_progress")),
            ],
        )
        .await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].kind(), FrameKind::Done);
    }

    #[tokio::test]
    async fn test_transport_fault_becomes_error_frame() {
        let frames = collect(
            ReportKind::Profile,
            vec![
                Ok(UpstreamEvent::new("response.output_text.delta").with_delta("abc")),
                Err(BackendError::new(
                    BackendErrorKind::NetworkError,
                    "connection reset",
                )),
            ],
        )
        .await;
        assert_eq!(
            frames.last(),
            Some(&Frame::error(ReportKind::Profile, "connection reset"))
        );
        assert_eq!(frames.iter().filter(|f| f.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_open_failure_after_start_frame() {
        let relay = Relay::new(ReportKind::Memo, classifier());
        let open = async { Err(BackendError::from_status(401, "Incorrect API key provided")) };
        let frames: Vec<Frame> = relay_stream(relay, open).collect().await;
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].kind(), FrameKind::Activity);
        assert_eq!(
            frames[1],
            Frame::error(ReportKind::Memo, "Incorrect API key provided")
        );
    }

    #[tokio::test]
    async fn test_spawn_relay_closes_channel() {
        let frames = futures::stream::iter(vec![
            Frame::delta(ReportKind::Profile, "a"),
            Frame::delta(ReportKind::Profile, ""),
            Frame::done(ReportKind::Profile, STREAM_COMPLETED),
            Frame::delta(ReportKind::Profile, "after"),
        ]);
        let mut rx = spawn_relay(frames, 4);

        let mut bytes = Vec::new();
        while let Some(chunk) = rx.recv().await {
            bytes.extend_from_slice(&chunk);
        }

        let parsed = parse_frames(&[], &bytes, ReportKind::Profile);
        assert_eq!(
            parsed.frames,
            vec![
                Frame::delta(ReportKind::Profile, "a"),
                Frame::done(ReportKind::Profile, STREAM_COMPLETED),
            ]
        );
    }

    #[tokio::test]
    async fn test_spawn_relay_stops_when_receiver_dropped() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<usize>();
        let frames = async_stream::stream! {
            for i in 0..1000usize {
                let _ = seen_tx.send(i);
                yield Frame::delta(ReportKind::Memo, format!("{}", i));
            }
        };
        let rx = spawn_relay(frames, 1);
        drop(rx);

        // 等待任务退出：发送端随帧流一起被释放
        let mut last = 0;
        while let Some(i) = seen_rx.recv().await {
            last = i;
        }
        assert!(last < 999);
    }

    #[tokio::test]
    async fn test_spawn_relay_releases_silent_upstream_on_disconnect() {
        let (released_tx, released_rx) = tokio::sync::oneshot::channel::<()>();
        let frames = async_stream::stream! {
            // 帧流被释放时 guard 一起释放
            let _guard = released_tx;
            yield Frame::activity(ReportKind::Profile, START_EVENT_TYPE, "start");
            futures::future::pending::<()>().await;
        };

        let mut rx = spawn_relay(frames, 4);
        assert!(rx.recv().await.is_some());
        drop(rx);

        let released = tokio::time::timeout(std::time::Duration::from_secs(1), released_rx).await;
        assert!(matches!(released, Ok(Err(_))));
    }
}
