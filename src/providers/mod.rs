//! Provider 实现
//!
//! 每个 Provider 实现 `ResearchBackend`，负责与具体上游服务通信。

pub mod deep_research;

pub use deep_research::DeepResearchProvider;
