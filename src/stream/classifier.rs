//! 上游事件分类器
//!
//! 将开放、带版本的上游事件类型字符串映射为一个封闭的信号集合。
//! 分类是全函数：任何字符串都恰好得到一个信号，未知类型落入
//! `Structural(Unknown)`，最终表现为一条可见的活动日志，而不是被吞掉或导致中继失败。

use crate::stream::events::ReportKind;
use crate::stream::parsers::upstream::UpstreamEvent;

/// 默认忽略的事件族（按子串匹配）
///
/// 文件检索、代码解释器、MCP 和工具调用的内部事件对用户没有价值
pub const DEFAULT_IGNORED_FAMILIES: [&str; 4] =
    ["file_search", "code_interpreter", "mcp", "tool_call"];

/// 结构性进度标记
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralMarker {
    OutputItemAdded,
    OutputItemDone,
    ContentPartAdded,
    ContentPartDone,
    WebSearchInProgress,
    WebSearchSearching,
    WebSearchCompleted,
    WebSearchFailed,
    RefusalDelta,
    SearchStateDelta,
    AnnotationAdded,
    ReasoningSummaryDelta,
    /// 未知事件类型，保留原始字符串
    Unknown(String),
}

/// 归一化的上游信号
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamSignal {
    /// 研究任务已创建
    LifecycleStart,
    /// 模型仍在处理
    LifecycleProgress,
    /// 上游响应完成
    LifecycleComplete,
    /// 上游声明的错误
    LifecycleError { message: Option<String> },
    /// 报告文本增量
    TextDelta { fragment: String },
    /// 报告文本输出结束
    TextDone,
    /// 可忽略的结构性标记，只产生活动消息
    Structural(StructuralMarker),
    /// 显式过滤的事件族
    Ignored,
}

impl UpstreamSignal {
    /// 生成活动日志消息
    ///
    /// 同一信号在 profile 和 memo 轨道上的措辞不同。
    /// `TextDelta` 和 `Ignored` 不产生活动消息。
    pub fn activity_message(&self, kind: ReportKind) -> Option<String> {
        let message = match self {
            Self::LifecycleStart => match kind {
                ReportKind::Profile => "🧠 CEO profile research job created.",
                ReportKind::Memo => "🧠 Investment memo research job created.",
            },
            Self::LifecycleProgress => match kind {
                ReportKind::Profile => "💭 Model is thinking through a CEO profile research step…",
                ReportKind::Memo => "💭 Model is thinking through an investment memo research step…",
            },
            Self::LifecycleComplete => match kind {
                ReportKind::Profile => "✅ CEO profile research completed.",
                ReportKind::Memo => "✅ Investment memo research completed.",
            },
            Self::LifecycleError { .. } => match kind {
                ReportKind::Profile => "❌ Error during CEO profile research.",
                ReportKind::Memo => "❌ Error during investment memo research.",
            },
            Self::TextDone => match kind {
                ReportKind::Profile => "✍️ Finished writing CEO profile text.",
                ReportKind::Memo => "✍️ Finished writing investment memo text.",
            },
            Self::Structural(marker) => return Some(marker.message()),
            Self::TextDelta { .. } | Self::Ignored => return None,
        };
        Some(message.to_string())
    }
}

impl StructuralMarker {
    fn message(&self) -> String {
        let message = match self {
            Self::OutputItemAdded => "🧩 Started a new output item…",
            Self::OutputItemDone => "🧱 Finished an output item.",
            Self::ContentPartAdded => "📄 Adding content part…",
            Self::ContentPartDone => "📄 Finished a content part.",
            Self::WebSearchInProgress => "🌐 Web search queued…",
            Self::WebSearchSearching => "🌍 Running web search…",
            Self::WebSearchCompleted => "🔎 Web search call completed.",
            Self::WebSearchFailed => "⚠️ Web search call failed.",
            Self::RefusalDelta => "⚠️ Model indicated a refusal delta.",
            Self::SearchStateDelta => "📡 Search state updated.",
            Self::AnnotationAdded => "📎 Added citation/annotation to the text.",
            Self::ReasoningSummaryDelta => "🤔 Reasoning summary updated.",
            Self::Unknown(raw) => return format!("ℹ️ Event: {}", raw),
        };
        message.to_string()
    }
}

/// 上游事件分类器
#[derive(Debug, Clone)]
pub struct UpstreamClassifier {
    /// 忽略的事件族（子串）
    ignored_families: Vec<String>,
}

impl Default for UpstreamClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_FAMILIES.iter().map(|s| s.to_string()).collect())
    }
}

impl UpstreamClassifier {
    pub fn new(ignored_families: Vec<String>) -> Self {
        Self {
            ignored_families: ignored_families
                .into_iter()
                .filter(|family| !family.is_empty())
                .collect(),
        }
    }

    pub fn ignored_families(&self) -> &[String] {
        &self.ignored_families
    }

    /// 按事件类型分类
    ///
    /// 携带数据的信号（`TextDelta`、`LifecycleError`）返回空负载，
    /// 由 `classify_event` 填充。
    pub fn classify(&self, event_type: &str) -> UpstreamSignal {
        if self
            .ignored_families
            .iter()
            .any(|family| event_type.contains(family.as_str()))
        {
            return UpstreamSignal::Ignored;
        }

        match event_type {
            "response.created" => UpstreamSignal::LifecycleStart,
            "response.queued" | "response.in_progress" => UpstreamSignal::LifecycleProgress,
            "response.completed" => UpstreamSignal::LifecycleComplete,
            "response.error" | "response.failed" | "error" => {
                UpstreamSignal::LifecycleError { message: None }
            }
            "response.output_text.delta" => UpstreamSignal::TextDelta {
                fragment: String::new(),
            },
            "response.output_text.done" => UpstreamSignal::TextDone,
            "response.output_item.added" => {
                UpstreamSignal::Structural(StructuralMarker::OutputItemAdded)
            }
            "response.output_item.done" => {
                UpstreamSignal::Structural(StructuralMarker::OutputItemDone)
            }
            "response.content_part.added" => {
                UpstreamSignal::Structural(StructuralMarker::ContentPartAdded)
            }
            "response.content_part.done" => {
                UpstreamSignal::Structural(StructuralMarker::ContentPartDone)
            }
            "response.web_search_call.in_progress" => {
                UpstreamSignal::Structural(StructuralMarker::WebSearchInProgress)
            }
            "response.web_search_call.searching" => {
                UpstreamSignal::Structural(StructuralMarker::WebSearchSearching)
            }
            "response.web_search_call.completed" => {
                UpstreamSignal::Structural(StructuralMarker::WebSearchCompleted)
            }
            "response.web_search_call.failed" => {
                UpstreamSignal::Structural(StructuralMarker::WebSearchFailed)
            }
            "response.refusal.delta" => UpstreamSignal::Structural(StructuralMarker::RefusalDelta),
            "response.search_state.delta" => {
                UpstreamSignal::Structural(StructuralMarker::SearchStateDelta)
            }
            "response.output_text.annotation.added" => {
                UpstreamSignal::Structural(StructuralMarker::AnnotationAdded)
            }
            "response.reasoning_summary_text.delta" => {
                UpstreamSignal::Structural(StructuralMarker::ReasoningSummaryDelta)
            }
            other => UpstreamSignal::Structural(StructuralMarker::Unknown(other.to_string())),
        }
    }

    /// 分类完整的上游事件，附带增量文本或错误消息
    pub fn classify_event(&self, event: &UpstreamEvent) -> UpstreamSignal {
        match self.classify(&event.event_type) {
            UpstreamSignal::TextDelta { .. } => UpstreamSignal::TextDelta {
                fragment: event.delta.clone().unwrap_or_default(),
            },
            UpstreamSignal::LifecycleError { .. } => UpstreamSignal::LifecycleError {
                message: event
                    .error_message
                    .clone()
                    .filter(|message| !message.is_empty()),
            },
            signal => signal,
        }
    }
}
