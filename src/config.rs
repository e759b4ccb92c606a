//! 程序配置
//!
//! 优先级：命令行 > 环境变量 > 配置文件 > 默认值。

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::decisions::ParseOptions;
use crate::error::ConfigError;
use crate::utils::RetryPolicy;

/// 默认配置文件（存在时自动读取）
pub const DEFAULT_CONFIG_FILE: &str = "refine.toml";

/// 记录选择方式
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// 按 ID 范围
    Range,
    /// 按条件组合
    Criteria,
    /// 所有未终稿的记录
    #[default]
    AllIncomplete,
}

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 文件 ---
    pub decisions_file: String,
    pub backup_dir: String,
    pub checkpoint_file: String,
    /// 输出日志文件
    pub output_log_file: String,
    /// 运行摘要 JSON（可选）
    pub summary_file: Option<String>,
    /// export-clean 的输出文件
    pub clean_output_file: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,

    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,

    // --- 搜索 API 配置 ---
    pub google_api_key: String,
    pub google_cx: String,
    pub search_results_per_query: u8,

    // --- 记录选择 ---
    pub selection_mode: SelectionMode,
    pub range_start: Option<u32>,
    pub range_end: Option<u32>,
    pub not_finalized: bool,
    pub missing_primary: bool,
    pub missing_secondary: bool,
    pub missing_queries: bool,
    pub limit: Option<usize>,

    // --- 链接分配 ---
    pub min_primary_score: u8,
    pub min_secondary_score: u8,
    pub max_queries: usize,
    /// 每个角色最多校验前 N 个候选
    pub validate_top_n: usize,
    pub auto_finalize: bool,
    pub auto_finalize_min_score: u8,
    pub auto_finalize_max_warnings: usize,
    /// 处理过的记录打上的批次标记，如 `BATCH_v20.0`
    pub batch_flag: Option<String>,

    // --- 节奏与重试 ---
    pub delay_between_records_ms: u64,
    pub delay_between_searches_ms: u64,
    pub max_retries: u32,
    pub retry_initial_delay_ms: u64,
    pub checkpoint_frequency: usize,
    pub request_timeout_secs: u64,
    pub validation_timeout_secs: u64,
    pub llm_timeout_secs: u64,

    // --- 解析 ---
    pub relevance_split_threshold: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            decisions_file: "decisions.txt".to_string(),
            backup_dir: "backups".to_string(),
            checkpoint_file: "checkpoint.json".to_string(),
            output_log_file: "output.txt".to_string(),
            summary_file: None,
            clean_output_file: "decisions_clean.txt".to_string(),
            verbose_logging: false,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.anthropic.com/v1".to_string(),
            llm_model_name: "claude-sonnet-4-20250514".to_string(),
            google_api_key: String::new(),
            google_cx: String::new(),
            search_results_per_query: 10,
            selection_mode: SelectionMode::AllIncomplete,
            range_start: None,
            range_end: None,
            not_finalized: true,
            missing_primary: false,
            missing_secondary: false,
            missing_queries: false,
            limit: None,
            min_primary_score: 75,
            min_secondary_score: 75,
            max_queries: 8,
            validate_top_n: 5,
            auto_finalize: false,
            auto_finalize_min_score: 90,
            auto_finalize_max_warnings: 1,
            batch_flag: None,
            delay_between_records_ms: 2000,
            delay_between_searches_ms: 500,
            max_retries: 3,
            retry_initial_delay_ms: 2000,
            checkpoint_frequency: 5,
            request_timeout_secs: 15,
            validation_timeout_secs: 10,
            llm_timeout_secs: 60,
            relevance_split_threshold: 150,
        }
    }
}

impl Config {
    /// 读取配置文件并叠加环境变量
    ///
    /// 未指定路径时，当前目录下存在 [`DEFAULT_CONFIG_FILE`] 就读取它，否则使用默认值。
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        Ok(config.with_env())
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    /// 环境变量覆盖
    pub fn with_env(self) -> Self {
        let env = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            llm_api_key: env("ANTHROPIC_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            google_api_key: env("GOOGLE_API_KEY").unwrap_or(self.google_api_key),
            google_cx: env("GOOGLE_CX").unwrap_or(self.google_cx),
            decisions_file: env("DECISIONS_FILE").unwrap_or(self.decisions_file),
            verbose_logging: env("VERBOSE_LOGGING")
                .and_then(|v| v.parse().ok())
                .unwrap_or(self.verbose_logging),
            ..self
        }
    }

    /// 校验配置
    ///
    /// `needs_services` 为真时（批处理）要求 API 凭据齐全。
    pub fn validate(&self, needs_services: bool) -> Result<(), ConfigError> {
        if needs_services {
            for (name, value) in [
                ("ANTHROPIC_API_KEY", &self.llm_api_key),
                ("GOOGLE_API_KEY", &self.google_api_key),
                ("GOOGLE_CX", &self.google_cx),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Missing {
                        name: name.to_string(),
                    });
                }
            }
        }

        for (name, score) in [
            ("min_primary_score", self.min_primary_score),
            ("min_secondary_score", self.min_secondary_score),
            ("auto_finalize_min_score", self.auto_finalize_min_score),
        ] {
            if score > 100 {
                return Err(invalid(name, format!("{} 超出 0-100", score)));
            }
        }

        if self.checkpoint_frequency == 0 {
            return Err(invalid("checkpoint_frequency", "必须大于 0"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "必须大于 0"));
        }
        if self.max_queries == 0 {
            return Err(invalid("max_queries", "必须大于 0"));
        }

        if self.selection_mode == SelectionMode::Range {
            match (self.range_start, self.range_end) {
                (Some(start), Some(end)) if start > end => {
                    return Err(invalid("range_start", format!("{} 大于 range_end {}", start, end)));
                }
                (Some(_), Some(_)) => {}
                _ => {
                    return Err(ConfigError::Missing {
                        name: "range_start / range_end".to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            relevance_split_threshold: self.relevance_split_threshold,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_initial_delay_ms),
        )
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        reason: reason.into(),
    }
}
