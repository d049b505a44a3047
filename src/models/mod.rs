//! 数据模型

pub mod research;

pub use research::{CompanyInfo, RawResearchRequest, ResearchRequest, ValidationError};
