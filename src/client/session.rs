//! 客户端会话状态
//!
//! 会话包含两个轨道的文档、活动日志和当前轨道指针。
//! 只有 Sequencer 写入会话状态。

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::stream::events::ReportKind;

/// 文档状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Streaming,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// 单个报告轨道的累积结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Document {
    text: String,
    status: DocumentStatus,
}

impl Document {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    /// 请求已发出
    pub(crate) fn begin(&mut self) {
        self.text.clear();
        self.status = DocumentStatus::Streaming;
    }

    /// 追加文本增量，仅在 streaming 状态生效
    pub(crate) fn append(&mut self, fragment: &str) -> bool {
        if self.status != DocumentStatus::Streaming {
            return false;
        }
        self.text.push_str(fragment);
        true
    }

    pub(crate) fn complete(&mut self) {
        if self.status == DocumentStatus::Streaming {
            self.status = DocumentStatus::Completed;
        }
    }

    pub(crate) fn fail(&mut self) {
        if !self.status.is_terminal() {
            self.status = DocumentStatus::Failed;
        }
    }
}

/// 活动日志条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// 从 1 开始单调递增
    pub id: u64,
    pub report_kind: ReportKind,
    pub message: String,
    /// 原始上游事件类型
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_type: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// 只追加的活动日志
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivityLog {
    entries: Vec<ActivityEntry>,
}

impl ActivityLog {
    pub fn entries(&self) -> &[ActivityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn push(
        &mut self,
        report_kind: ReportKind,
        message: impl Into<String>,
        raw_type: Option<String>,
    ) -> &ActivityEntry {
        let id = self.entries.len() as u64 + 1;
        self.entries.push(ActivityEntry {
            id,
            report_kind,
            message: message.into(),
            raw_type,
            timestamp: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }
}

/// 一次报告生成会话
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    profile: Document,
    memo: Document,
    activity: ActivityLog,
    current_track: Option<ReportKind>,
    error: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            profile: Document::default(),
            memo: Document::default(),
            activity: ActivityLog::default(),
            current_track: None,
            error: None,
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document(&self, kind: ReportKind) -> &Document {
        match kind {
            ReportKind::Profile => &self.profile,
            ReportKind::Memo => &self.memo,
        }
    }

    pub(crate) fn document_mut(&mut self, kind: ReportKind) -> &mut Document {
        match kind {
            ReportKind::Profile => &mut self.profile,
            ReportKind::Memo => &mut self.memo,
        }
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub(crate) fn activity_mut(&mut self) -> &mut ActivityLog {
        &mut self.activity
    }

    pub fn current_track(&self) -> Option<ReportKind> {
        self.current_track
    }

    pub(crate) fn set_current_track(&mut self, track: Option<ReportKind>) {
        self.current_track = track;
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub(crate) fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

/// 会话事件监听器
///
/// 渲染方实现需要的回调即可
pub trait SessionListener: Send {
    fn on_track_started(&mut self, _kind: ReportKind) {}

    fn on_activity(&mut self, _entry: &ActivityEntry) {}

    fn on_delta(&mut self, _kind: ReportKind, _fragment: &str) {}

    fn on_track_finished(&mut self, _kind: ReportKind, _document: &Document) {}

    fn on_session_error(&mut self, _message: &str) {}
}

/// 不做任何事的监听器
#[derive(Debug, Default)]
pub struct NoopListener;

impl SessionListener for NoopListener {}
