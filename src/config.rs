//! 配置管理模块
//!
//! 从 YAML 文件加载配置，缺失的文件或字段使用默认值，
//! 随后应用环境变量覆盖。
//!
//! 默认路径：`~/.research-relay/config.yaml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::stream::classifier::DEFAULT_IGNORED_FAMILIES;
use crate::stream::events::ReportKind;

/// 上游 API Key 环境变量
pub const ENV_API_KEY: &str = "OPENAI_API_KEY";
/// 模型覆盖环境变量
pub const ENV_MODEL: &str = "OPEN_AI_MODEL";
/// 最大输出 token 覆盖环境变量
pub const ENV_MAX_OUTPUT_TOKENS: &str = "OPEN_AI_MAX_OUTPUT_TOKENS";

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("读取配置文件失败: {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件失败: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("配置无效: {0}")]
    Invalid(String),
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub relay: RelayConfig,
    pub client: ClientConfig,
    pub prompts: PromptsConfig,
    pub logging: LoggingConfig,
}

/// HTTP 服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 请求体大小上限（字节）
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_body_bytes: 64 * 1024,
        }
    }
}

/// 上游 Responses API 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub max_tool_calls: u32,
    pub reasoning_effort: String,
    pub search_context_size: String,
    /// 单次上游请求的总时长上限（秒）
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            model: "o4-mini-deep-research-2025-06-26".to_string(),
            max_output_tokens: 35_000,
            max_tool_calls: 5,
            reasoning_effort: "medium".to_string(),
            search_context_size: "medium".to_string(),
            request_timeout_secs: 20 * 60,
            connect_timeout_secs: 30,
        }
    }
}

impl UpstreamConfig {
    /// API Key 是否可用（非空）
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// 中继配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 按子串匹配忽略的上游事件族
    pub ignored_event_families: Vec<String>,
    /// 输出通道容量（帧）
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ignored_event_families: DEFAULT_IGNORED_FAMILIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            channel_capacity: 64,
        }
    }
}

/// 客户端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    /// 等待轨道响应头的时间上限（秒），0 表示不限制
    pub start_timeout_secs: u64,
    /// 两个 chunk 之间的最大空闲时间（秒），0 表示不限制
    pub stream_idle_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            start_timeout_secs: 60,
            stream_idle_timeout_secs: 0,
        }
    }
}

/// 单个报告类型的提示词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPair {
    pub system: String,
    pub developer: String,
}

/// 提示词配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub profile: PromptPair,
    pub memo: PromptPair,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            profile: PromptPair {
                system: "You are a research analyst who writes concise, well-sourced executive profiles in markdown.".to_string(),
                developer: "Research the current CEO of the given company. Cover background, career history, leadership style, notable decisions and recent news. Cite sources inline.".to_string(),
            },
            memo: PromptPair {
                system: "You are an investment analyst who writes structured investment memos in markdown.".to_string(),
                developer: "Research the given company. Cover business model, market, competition, financials, risks and an overall recommendation. Cite sources inline.".to_string(),
            },
        }
    }
}

impl PromptsConfig {
    pub fn for_kind(&self, kind: ReportKind) -> &PromptPair {
        match kind {
            ReportKind::Profile => &self.profile,
            ReportKind::Memo => &self.memo,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 默认日志级别，`RUST_LOG` 优先
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// 默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".research-relay").join("config.yaml"))
}

/// 展开路径开头的 `~`
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// 从 YAML 字符串解析
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// 从文件加载，文件不存在时返回默认配置
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("[CONFIG] 配置文件不存在，使用默认配置: {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&content)?;
        tracing::info!("[CONFIG] 已加载配置: {}", path.display());
        Ok(config)
    }

    /// 加载配置并应用环境变量覆盖
    ///
    /// `path` 为空时使用默认路径
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => expand_tilde(p),
            None => match default_config_path() {
                Some(p) => p,
                None => {
                    tracing::warn!("[CONFIG] 无法获取主目录，使用默认配置");
                    let mut config = Self::default();
                    config.apply_env_overrides();
                    config.validate()?;
                    return Ok(config);
                }
            },
        };

        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 应用进程环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|key| std::env::var(key).ok());
    }

    /// 使用给定查找函数应用环境变量覆盖
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty()) {
            self.upstream.api_key = Some(key);
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            self.upstream.model = model;
        }
        if let Some(raw) = lookup(ENV_MAX_OUTPUT_TOKENS) {
            match raw.trim().parse::<u32>() {
                Ok(tokens) => self.upstream.max_output_tokens = tokens,
                Err(_) => tracing::warn!(
                    "[CONFIG] 忽略无效的 {}: {}",
                    ENV_MAX_OUTPUT_TOKENS,
                    raw
                ),
            }
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.relay.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "relay.channel_capacity 必须大于 0".to_string(),
            ));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.base_url 不能为空".to_string()));
        }
        if self.upstream.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "upstream.request_timeout_secs 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.upstream.model, "o4-mini-deep-research-2025-06-26");
        assert_eq!(config.upstream.max_output_tokens, 35_000);
        assert_eq!(config.upstream.request_timeout_secs, 1200);
        assert_eq!(
            config.relay.ignored_event_families,
            vec!["file_search", "code_interpreter", "mcp", "tool_call"]
        );
        assert!(!config.upstream.has_api_key());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            "server:\n  port: 8080\nrelay:\n  ignored_event_families: [mcp]\n",
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.relay.ignored_event_families, vec!["mcp"]);
        assert_eq!(config.relay.channel_capacity, 64);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            Config::from_yaml("server: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "upstream:\n  api_key: sk-test\n  model: o3-deep-research").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.upstream.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.upstream.model, "o3-deep-research");
        assert!(config.upstream.has_api_key());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_KEY, "sk-env"),
            (ENV_MODEL, "o3-deep-research"),
            (ENV_MAX_OUTPUT_TOKENS, "1000"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_overrides_with(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.upstream.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.upstream.model, "o3-deep-research");
        assert_eq!(config.upstream.max_output_tokens, 1000);
    }

    #[test]
    fn test_invalid_env_token_count_ignored() {
        let mut config = Config::default();
        config.apply_env_overrides_with(|key| {
            (key == ENV_MAX_OUTPUT_TOKENS).then(|| "lots".to_string())
        });
        assert_eq!(config.upstream.max_output_tokens, 35_000);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = Config::default();
        config.relay.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_prompts_for_kind() {
        let prompts = PromptsConfig::default();
        assert_ne!(
            prompts.for_kind(ReportKind::Profile),
            prompts.for_kind(ReportKind::Memo)
        );
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/tmp/x.yaml"), PathBuf::from("/tmp/x.yaml"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/a.yaml"), home.join("a.yaml"));
        }
    }
}
