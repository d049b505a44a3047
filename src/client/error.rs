//! 客户端会话错误

use thiserror::Error;

use crate::stream::events::ReportKind;

/// 会话错误
///
/// `Display` 输出写入 `Session::error`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// 轨道请求无法开始（非 2xx 或传输错误）
    #[error("{message}")]
    StartFailed {
        report_kind: ReportKind,
        message: String,
    },

    /// 读取字节流时出错
    #[error("Stream error while reading {report_kind} report: {message}")]
    Stream {
        report_kind: ReportKind,
        message: String,
    },

    /// 两个 chunk 之间空闲过久
    #[error("No data received for {timeout_ms}ms while streaming {report_kind} report")]
    IdleTimeout {
        report_kind: ReportKind,
        timeout_ms: u64,
    },

    /// 流在终止帧之前关闭
    #[error("Stream for {report_kind} report closed before completion")]
    MissingTerminator { report_kind: ReportKind },

    /// 服务端发出的 error 帧
    #[error("{0}")]
    Upstream(String),

    /// 调用方取消
    #[error("Research cancelled")]
    Cancelled,
}

impl SessionError {
    /// 默认的启动失败错误
    pub fn start_failed(report_kind: ReportKind) -> Self {
        SessionError::StartFailed {
            report_kind,
            message: format!("Failed to start {} stream", report_kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            SessionError::start_failed(ReportKind::Memo).to_string(),
            "Failed to start memo stream"
        );
        assert_eq!(
            SessionError::Upstream("rate limited".to_string()).to_string(),
            "rate limited"
        );
        assert_eq!(
            SessionError::MissingTerminator {
                report_kind: ReportKind::Profile
            }
            .to_string(),
            "Stream for profile report closed before completion"
        );
    }
}
