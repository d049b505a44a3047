//! 统一帧类型
//!
//! 定义中继 (relay) 与客户端解码器 (decoder) 之间共享的协议词汇。
//!
//! # 设计原则
//!
//! - 上游事件经分类器映射后只产生四种帧：`activity`、`delta`、`error`、`done`
//! - 每个帧都属于一个报告轨道 (`ReportKind`)
//! - 一个轨道的帧序列恰好以一个 `done` 或一个 `error` 结束

use serde::{Deserialize, Serialize};

/// 报告轨道
///
/// 兼容旧的 `CEO` / `investment` 写法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// 高管画像报告
    #[serde(alias = "CEO", alias = "ceo")]
    Profile,
    /// 投资备忘录
    #[serde(alias = "investment")]
    Memo,
}

impl ReportKind {
    /// 按 Sequencer 的处理顺序排列
    pub const ALL: [ReportKind; 2] = [ReportKind::Profile, ReportKind::Memo];

    /// 从字符串解析报告轨道
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "profile" | "CEO" | "ceo" => Some(Self::Profile),
            "memo" | "investment" => Some(Self::Memo),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Profile => "profile",
            Self::Memo => "memo",
        }
    }

    /// 活动日志中使用的大写标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Profile => "PROFILE",
            Self::Memo => "MEMO",
        }
    }

    /// 非流式接口返回 JSON 中的字段名
    pub fn response_key(&self) -> String {
        format!("{}Report", self.as_str())
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 帧类型（封闭集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Activity,
    Delta,
    Error,
    Done,
}

impl FrameKind {
    /// SSE `event:` 行使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Delta => "delta",
            Self::Error => "error",
            Self::Done => "done",
        }
    }

    /// 从 SSE 事件名解析，未知名称返回 `None`
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "activity" => Some(Self::Activity),
            "delta" => Some(Self::Delta),
            "error" => Some(Self::Error),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// 是否为终止帧
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::Done)
    }
}

/// 帧负载
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePayload {
    /// 进度消息
    Activity {
        /// 原始上游事件类型或标记（诊断用）
        event_type: Option<String>,
        /// 人类可读消息
        message: String,
    },

    /// 文本增量，按到达顺序追加到文档
    Delta {
        /// 文本片段
        text_delta: String,
    },

    /// 终止错误
    Error {
        /// 错误消息
        message: String,
    },

    /// 正常结束
    Done {
        /// 结束消息
        message: String,
    },
}

/// 协议帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 所属报告轨道
    pub report_kind: ReportKind,
    /// 负载
    pub payload: FramePayload,
}

impl Frame {
    pub fn activity(
        report_kind: ReportKind,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            report_kind,
            payload: FramePayload::Activity {
                event_type: Some(event_type.into()),
                message: message.into(),
            },
        }
    }

    pub fn delta(report_kind: ReportKind, text_delta: impl Into<String>) -> Self {
        Self {
            report_kind,
            payload: FramePayload::Delta {
                text_delta: text_delta.into(),
            },
        }
    }

    pub fn error(report_kind: ReportKind, message: impl Into<String>) -> Self {
        Self {
            report_kind,
            payload: FramePayload::Error {
                message: message.into(),
            },
        }
    }

    pub fn done(report_kind: ReportKind, message: impl Into<String>) -> Self {
        Self {
            report_kind,
            payload: FramePayload::Done {
                message: message.into(),
            },
        }
    }

    /// 获取帧类型
    pub fn kind(&self) -> FrameKind {
        match &self.payload {
            FramePayload::Activity { .. } => FrameKind::Activity,
            FramePayload::Delta { .. } => FrameKind::Delta,
            FramePayload::Error { .. } => FrameKind::Error,
            FramePayload::Done { .. } => FrameKind::Done,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind().is_terminal()
    }
}

/// 线上 JSON 负载
///
/// 四种帧共用一个结构，缺失字段在解码时按帧类型补齐
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WirePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_kind: Option<ReportKind>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_delta: Option<String>,
}
