//! 研究报告客户端
//!
//! 依次请求 profile 和 memo 两个轨道，解码帧流并更新会话状态。
//!
//! # 使用示例
//!
//! ```ignore
//! let client = ResearchClient::new(Arc::new(HttpTrackSource::new(&url)), timeouts);
//! let mut sequencer = Sequencer::new(Box::new(listener));
//! client.run(&mut sequencer, &company, &cancel).await?;
//! let session = sequencer.into_session();
//! ```

pub mod decoder;
pub mod error;
pub mod sequencer;
pub mod session;
pub mod source;

pub use decoder::FrameDecoder;
pub use error::SessionError;
pub use sequencer::{Sequencer, SequencerState, Transition};
pub use session::{
    ActivityEntry, ActivityLog, Document, DocumentStatus, NoopListener, Session, SessionListener,
};
pub use source::{ChunkStream, HttpTrackSource, TrackSource};

use std::sync::Arc;

use crate::models::research::CompanyInfo;
use crate::resilience::{CancellationToken, TimeoutController, TimeoutError};
use crate::stream::events::ReportKind;

/// 两阶段研究客户端
pub struct ResearchClient {
    source: Arc<dyn TrackSource>,
    timeouts: TimeoutController,
}

impl ResearchClient {
    pub fn new(source: Arc<dyn TrackSource>, timeouts: TimeoutController) -> Self {
        Self { source, timeouts }
    }

    /// 运行完整会话
    ///
    /// 任何轨道失败都会结束会话，剩余轨道不再请求。
    /// 返回时会话状态已写入 `sequencer`。
    pub async fn run(
        &self,
        sequencer: &mut Sequencer,
        company: &CompanyInfo,
        cancel: &CancellationToken,
    ) -> Result<(), SessionError> {
        let mut next = Some(sequencer.start());
        while let Some(track) = next {
            next = self.run_track(sequencer, company, track, cancel).await?;
        }
        Ok(())
    }

    /// 处理单个轨道，返回下一个要请求的轨道
    async fn run_track(
        &self,
        sequencer: &mut Sequencer,
        company: &CompanyInfo,
        track: ReportKind,
        cancel: &CancellationToken,
    ) -> Result<Option<ReportKind>, SessionError> {
        let request = company.request_for(track);

        let opened = self
            .timeouts
            .execute_with_timeout_and_cancel(self.source.open(&request), cancel)
            .await;
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(sequencer.fail(e)),
            Err(TimeoutError::Cancelled) => return Err(sequencer.fail(SessionError::Cancelled)),
            Err(e) => {
                tracing::error!("[CLIENT] 轨道启动超时: track={} error={}", track, e);
                return Err(sequencer.fail(SessionError::start_failed(track)));
            }
        };

        let mut decoder = FrameDecoder::new(track);
        loop {
            let chunk = match self.timeouts.next_with_idle_timeout(&mut stream, cancel).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return Err(sequencer.fail(e)),
                Ok(None) => {
                    decoder.finish();
                    return Err(
                        sequencer.fail(SessionError::MissingTerminator { report_kind: track })
                    );
                }
                Err(TimeoutError::StreamIdleTimeout { timeout_ms }) => {
                    return Err(sequencer.fail(SessionError::IdleTimeout {
                        report_kind: track,
                        timeout_ms,
                    }));
                }
                Err(_) => return Err(sequencer.fail(SessionError::Cancelled)),
            };

            for frame in decoder.feed(&chunk) {
                match sequencer.apply_frame(frame) {
                    Transition::Continue => {}
                    Transition::StartTrack(next) => return Ok(Some(next)),
                    Transition::Finished => return Ok(None),
                    Transition::Failed(e) => return Err(e),
                }
            }
        }
    }
}
