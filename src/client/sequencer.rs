//! 两阶段 Sequencer
//!
//! 显式状态机：一次只处理一个报告轨道，profile 完成后才开始 memo。
//!
//! ```text
//! Idle ──start──> ProfileActive ──done──> MemoActive ──done──> Finished
//!                      │                      │
//!                      └───────error──────────┴──> Failed
//! ```
//!
//! 状态机本身不做 I/O，`Transition` 告诉驱动方下一步做什么。

use crate::client::error::SessionError;
use crate::client::session::{NoopListener, Session, SessionListener};
use crate::stream::events::{Frame, FramePayload, ReportKind};

/// Sequencer 状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    ProfileActive,
    MemoActive,
    Finished,
    Failed,
}

impl SequencerState {
    /// 当前活动轨道
    pub fn active_track(&self) -> Option<ReportKind> {
        match self {
            Self::ProfileActive => Some(ReportKind::Profile),
            Self::MemoActive => Some(ReportKind::Memo),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// 处理帧后的下一步
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// 继续读取当前轨道
    Continue,
    /// 当前轨道完成，发起下一个轨道的请求
    StartTrack(ReportKind),
    /// 所有轨道完成
    Finished,
    /// 会话失败
    Failed(SessionError),
}

pub struct Sequencer {
    state: SequencerState,
    session: Session,
    listener: Box<dyn SessionListener>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(Box::new(NoopListener))
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("state", &self.state)
            .field("session", &self.session)
            .finish()
    }
}

impl Sequencer {
    pub fn new(listener: Box<dyn SessionListener>) -> Self {
        Self {
            state: SequencerState::Idle,
            session: Session::new(),
            listener,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    /// 开始新会话，返回第一个轨道
    ///
    /// 之前的文档和活动日志全部清空
    pub fn start(&mut self) -> ReportKind {
        self.session = Session::new();
        tracing::info!("[SEQUENCER] 开始会话: id={}", self.session.id);
        self.begin_track(ReportKind::Profile);
        ReportKind::Profile
    }

    /// 清空会话回到 Idle
    pub fn reset(&mut self) {
        self.session = Session::new();
        self.state = SequencerState::Idle;
    }

    fn begin_track(&mut self, kind: ReportKind) {
        self.state = match kind {
            ReportKind::Profile => SequencerState::ProfileActive,
            ReportKind::Memo => SequencerState::MemoActive,
        };
        self.session.set_current_track(Some(kind));
        self.session.document_mut(kind).begin();
        self.listener.on_track_started(kind);
    }

    /// 应用一个帧
    pub fn apply_frame(&mut self, frame: Frame) -> Transition {
        let Some(active) = self.state.active_track() else {
            tracing::warn!(
                "[SEQUENCER] 没有活动轨道，丢弃帧: state={:?} frame_kind={:?}",
                self.state,
                frame.kind()
            );
            return Transition::Continue;
        };

        if frame.report_kind != active {
            tracing::warn!(
                "[SEQUENCER] 丢弃非活动轨道的帧: active={} frame_track={} frame_kind={:?}",
                active,
                frame.report_kind,
                frame.kind()
            );
            return Transition::Continue;
        }

        match frame.payload {
            FramePayload::Delta { text_delta } => {
                if self.session.document_mut(active).append(&text_delta) {
                    self.listener.on_delta(active, &text_delta);
                }
                Transition::Continue
            }
            FramePayload::Activity {
                event_type,
                message,
            } => {
                let entry = self
                    .session
                    .activity_mut()
                    .push(active, message, event_type);
                self.listener.on_activity(entry);
                Transition::Continue
            }
            FramePayload::Error { message } => {
                let entry = self.session.activity_mut().push(
                    active,
                    format!("❌ {}", message),
                    Some("error".to_string()),
                );
                self.listener.on_activity(entry);
                Transition::Failed(self.fail(SessionError::Upstream(message)))
            }
            FramePayload::Done { .. } => {
                self.session.document_mut(active).complete();
                self.listener
                    .on_track_finished(active, self.session.document(active));
                tracing::info!(
                    "[SEQUENCER] 轨道完成: id={} track={} chars={}",
                    self.session.id,
                    active,
                    self.session.document(active).text().chars().count()
                );

                match active {
                    ReportKind::Profile => {
                        self.begin_track(ReportKind::Memo);
                        Transition::StartTrack(ReportKind::Memo)
                    }
                    ReportKind::Memo => {
                        self.state = SequencerState::Finished;
                        self.session.set_current_track(None);
                        Transition::Finished
                    }
                }
            }
        }
    }

    /// 会话失败
    ///
    /// 当前轨道的文档标记为失败，剩余轨道不会开始；已完成的文档保留。
    pub fn fail(&mut self, error: SessionError) -> SessionError {
        if self.state.is_terminal() {
            return error;
        }

        if let Some(active) = self.state.active_track() {
            self.session.document_mut(active).fail();
            self.listener
                .on_track_finished(active, self.session.document(active));
        }

        let message = error.to_string();
        tracing::warn!(
            "[SEQUENCER] 会话失败: id={} state={:?} error={}",
            self.session.id,
            self.state,
            message
        );
        self.session.set_error(message.clone());
        self.session.set_current_track(None);
        self.state = SequencerState::Failed;
        self.listener.on_session_error(&message);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::session::DocumentStatus;

    #[test]
    fn test_two_phase_happy_path() {
        let mut seq = Sequencer::default();
        assert_eq!(seq.state(), SequencerState::Idle);
        assert_eq!(seq.start(), ReportKind::Profile);
        assert_eq!(seq.state(), SequencerState::ProfileActive);

        seq.apply_frame(Frame::delta(ReportKind::Profile, "P"));
        assert_eq!(
            seq.apply_frame(Frame::done(ReportKind::Profile, "Stream completed.")),
            Transition::StartTrack(ReportKind::Memo)
        );
        assert_eq!(seq.state(), SequencerState::MemoActive);
        assert_eq!(seq.session().current_track(), Some(ReportKind::Memo));

        seq.apply_frame(Frame::delta(ReportKind::Memo, "M"));
        assert_eq!(
            seq.apply_frame(Frame::done(ReportKind::Memo, "Stream completed.")),
            Transition::Finished
        );
        assert_eq!(seq.state(), SequencerState::Finished);

        let session = seq.session();
        assert_eq!(session.document(ReportKind::Profile).text(), "P");
        assert_eq!(session.document(ReportKind::Memo).text(), "M");
        assert_eq!(
            session.document(ReportKind::Memo).status(),
            DocumentStatus::Completed
        );
        assert_eq!(session.error(), None);
    }

    #[test]
    fn test_error_on_profile_skips_memo() {
        let mut seq = Sequencer::default();
        seq.start();
        seq.apply_frame(Frame::delta(ReportKind::Profile, "Partial"));

        let transition = seq.apply_frame(Frame::error(ReportKind::Profile, "rate limited"));
        assert_eq!(
            transition,
            Transition::Failed(SessionError::Upstream("rate limited".to_string()))
        );
        assert_eq!(seq.state(), SequencerState::Failed);

        let session = seq.session();
        assert_eq!(session.error(), Some("rate limited"));
        assert_eq!(
            session.document(ReportKind::Profile).status(),
            DocumentStatus::Failed
        );
        assert_eq!(session.document(ReportKind::Profile).text(), "Partial");
        assert_eq!(
            session.document(ReportKind::Memo).status(),
            DocumentStatus::Pending
        );
        assert_eq!(session.current_track(), None);
        let last = session.activity().entries().last().unwrap();
        assert_eq!(last.message, "❌ rate limited");
    }

    #[test]
    fn test_start_failure_clears_current_track() {
        let mut seq = Sequencer::default();
        seq.start();
        seq.apply_frame(Frame::done(ReportKind::Profile, "Stream completed."));
        assert_eq!(seq.session().current_track(), Some(ReportKind::Memo));

        seq.fail(SessionError::start_failed(ReportKind::Memo));
        assert_eq!(seq.state(), SequencerState::Failed);
        assert_eq!(seq.session().current_track(), None);
        assert_eq!(seq.session().error(), Some("Failed to start memo stream"));
    }

    #[test]
    fn test_memo_error_keeps_profile_document() {
        let mut seq = Sequencer::default();
        seq.start();
        seq.apply_frame(Frame::delta(ReportKind::Profile, "Profile text"));
        seq.apply_frame(Frame::done(ReportKind::Profile, ""));
        seq.apply_frame(Frame::error(ReportKind::Memo, "boom"));

        let session = seq.session();
        assert_eq!(
            session.document(ReportKind::Profile).status(),
            DocumentStatus::Completed
        );
        assert_eq!(session.document(ReportKind::Profile).text(), "Profile text");
        assert_eq!(
            session.document(ReportKind::Memo).status(),
            DocumentStatus::Failed
        );
    }

    #[test]
    fn test_frames_for_inactive_track_dropped() {
        let mut seq = Sequencer::default();
        seq.start();
        assert_eq!(
            seq.apply_frame(Frame::delta(ReportKind::Memo, "wrong track")),
            Transition::Continue
        );
        assert_eq!(
            seq.apply_frame(Frame::done(ReportKind::Memo, "")),
            Transition::Continue
        );
        assert_eq!(seq.state(), SequencerState::ProfileActive);
        assert!(seq.session().document(ReportKind::Memo).text().is_empty());
    }

    #[test]
    fn test_frames_after_terminator_dropped() {
        let mut seq = Sequencer::default();
        seq.start();
        seq.apply_frame(Frame::error(ReportKind::Profile, "boom"));
        let log_len = seq.session().activity().len();

        assert_eq!(
            seq.apply_frame(Frame::delta(ReportKind::Profile, "late")),
            Transition::Continue
        );
        assert_eq!(
            seq.apply_frame(Frame::activity(ReportKind::Profile, "x", "late")),
            Transition::Continue
        );
        assert_eq!(seq.session().activity().len(), log_len);
        assert_eq!(seq.session().document(ReportKind::Profile).text(), "");
    }

    #[test]
    fn test_activity_goes_to_log_only() {
        let mut seq = Sequencer::default();
        seq.start();
        seq.apply_frame(Frame::activity(
            ReportKind::Profile,
            "response.created",
            "🧠 CEO profile research job created.",
        ));
        let session = seq.session();
        assert!(session.document(ReportKind::Profile).text().is_empty());
        let entry = &session.activity().entries()[0];
        assert_eq!(entry.id, 1);
        assert_eq!(entry.report_kind, ReportKind::Profile);
        assert_eq!(entry.raw_type.as_deref(), Some("response.created"));
    }

    #[test]
    fn test_start_resets_previous_session() {
        let mut seq = Sequencer::default();
        seq.start();
        seq.apply_frame(Frame::activity(ReportKind::Profile, "start", "hi"));
        seq.fail(SessionError::Cancelled);
        let first_id = seq.session().id;

        seq.start();
        assert_ne!(seq.session().id, first_id);
        assert!(seq.session().activity().is_empty());
        assert_eq!(seq.session().error(), None);
    }

    #[test]
    fn test_fail_is_idempotent() {
        let mut seq = Sequencer::default();
        seq.start();
        seq.fail(SessionError::Cancelled);
        seq.fail(SessionError::Upstream("later".to_string()));
        assert_eq!(seq.session().error(), Some("Research cancelled"));
    }
}
