//! 研究请求模型
//!
//! 客户端与服务端共用的请求体定义。线上字段使用 camelCase：
//!
//! ```json
//! {"companyName":"Acme","companyLocation":"Berlin","companyRevenue":"$10M","reportKind":"profile"}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stream::events::ReportKind;

/// 缺少必填字段时返回的错误消息
pub const MISSING_FIELDS_MESSAGE: &str =
    "Missing required fields: companyName, companyLocation, companyRevenue, reportKind";

/// 公司信息（由表单收集方提供）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub name: String,
    pub location: String,
    pub revenue: String,
}

impl CompanyInfo {
    pub fn new(
        name: impl Into<String>,
        location: impl Into<String>,
        revenue: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            revenue: revenue.into(),
        }
    }

    /// 为指定轨道构建请求
    pub fn request_for(&self, report_kind: ReportKind) -> ResearchRequest {
        ResearchRequest {
            company_name: self.name.clone(),
            company_location: self.location.clone(),
            company_revenue: self.revenue.clone(),
            report_kind,
        }
    }
}

/// 已校验的研究请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRequest {
    pub company_name: String,
    pub company_location: String,
    pub company_revenue: String,
    pub report_kind: ReportKind,
}

impl ResearchRequest {
    /// 用户消息正文
    pub fn user_prompt(&self) -> String {
        let instruction = match self.report_kind {
            ReportKind::Profile => {
                "Please apply the CEO profile structure and guidance on the CEO of the company."
            }
            ReportKind::Memo => {
                "Please apply the investment memo structure and guidance on the company."
            }
        };
        format!(
            "Company: {}\nHeadquarters: {}\nLatest annual revenue: {}\n\n{}",
            self.company_name, self.company_location, self.company_revenue, instruction
        )
    }
}

/// 未校验的请求体
///
/// 所有字段都是可选字符串，`validate` 统一给出错误消息。
/// `reportType` 是旧版字段名。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResearchRequest {
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub company_location: Option<String>,
    #[serde(default)]
    pub company_revenue: Option<String>,
    #[serde(default, alias = "reportType")]
    pub report_kind: Option<String>,
}

/// 请求校验失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// 缺少必填字段（或为空字符串）
    #[error("{}", MISSING_FIELDS_MESSAGE)]
    MissingFields,
    /// 报告类型不是 profile / memo
    #[error("Invalid reportKind: {0}. Expected one of: profile, memo")]
    UnknownReportKind(String),
}

fn required(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.trim().is_empty())
}

impl RawResearchRequest {
    pub fn validate(self) -> Result<ResearchRequest, ValidationError> {
        let (Some(company_name), Some(company_location), Some(company_revenue), Some(kind)) = (
            required(self.company_name),
            required(self.company_location),
            required(self.company_revenue),
            required(self.report_kind),
        ) else {
            return Err(ValidationError::MissingFields);
        };

        let report_kind =
            ReportKind::parse(&kind).ok_or(ValidationError::UnknownReportKind(kind))?;

        Ok(ResearchRequest {
            company_name,
            company_location,
            company_revenue,
            report_kind,
        })
    }
}
