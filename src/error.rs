use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（致命，运行开始前中止）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 外部 API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 记录状态错误
    #[error("记录错误: {0}")]
    Record(#[from] RecordError),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件读取失败
    #[error("无法读取配置文件 {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件解析失败
    #[error("配置文件解析失败 {path}: {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 缺少必要的配置项
    #[error("缺少必要的配置项: {name}")]
    Missing { name: String },
    /// 配置值不合法
    #[error("配置项 {name} 的值不合法: {reason}")]
    Invalid { name: String, reason: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 文件不存在
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 备份失败
    #[error("备份文件失败 ({path}): {source}")]
    BackupFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 同一个 ID 出现多次
    #[error("文件 {path} 中 ID [{id}] 重复出现")]
    DuplicateId { path: String, id: u32 },
    /// JSON 序列化/反序列化失败
    #[error("JSON 处理失败 ({path}): {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// 外部 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败（含超时）
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// API 返回错误状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message}")]
    BadResponse {
        endpoint: String,
        status: u16,
        message: String,
    },
    /// 请求频率限制
    #[error("API请求频率限制 ({endpoint})")]
    RateLimited { endpoint: String },
    /// 响应格式错误
    #[error("API响应格式错误 ({endpoint}): {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed {
        model: String,
        #[source]
        source: async_openai::error::OpenAIError,
    },
    /// 调用超时
    #[error("LLM调用超时 (模型: {model}, {secs}秒)")]
    Timeout { model: String, secs: u64 },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容无法解析
    #[error("无法解析LLM返回内容: {reason}")]
    UnparsableResponse { reason: String },
}

/// 记录状态错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// 终稿记录必须有主链接
    #[error("记录 [{id}] 没有主链接，无法标记为 FINALIZED")]
    MissingPrimaryUrl { id: u32 },
    /// 记录不存在
    #[error("记录 [{id}] 不存在")]
    NotFound { id: u32 },
}

impl AppError {
    /// 是否值得重试
    ///
    /// 网络错误、超时、限流、5xx 和 LLM 的临时故障可以重试；
    /// 配置、文件和格式错误重试也不会成功。
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Api(ApiError::RequestFailed { .. }) => true,
            AppError::Api(ApiError::RateLimited { .. }) => true,
            AppError::Api(ApiError::BadResponse { status, .. }) => *status >= 500,
            AppError::Api(ApiError::MalformedResponse { .. }) => false,
            AppError::Llm(LlmError::ApiCallFailed { .. }) => true,
            AppError::Llm(LlmError::Timeout { .. }) => true,
            AppError::Llm(LlmError::EmptyContent { .. }) => true,
            AppError::Llm(LlmError::UnparsableResponse { .. }) => true,
            AppError::Config(_) | AppError::File(_) | AppError::Record(_) => false,
        }
    }

    /// 创建API请求失败错误
    pub fn api_request_failed(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source,
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: async_openai::error::OpenAIError,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source,
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let rate_limited = AppError::Api(ApiError::RateLimited {
            endpoint: "search".to_string(),
        });
        assert!(rate_limited.is_retryable());

        let server_error = AppError::Api(ApiError::BadResponse {
            endpoint: "search".to_string(),
            status: 503,
            message: String::new(),
        });
        assert!(server_error.is_retryable());

        let client_error = AppError::Api(ApiError::BadResponse {
            endpoint: "search".to_string(),
            status: 403,
            message: "forbidden".to_string(),
        });
        assert!(!client_error.is_retryable());

        let missing = AppError::Config(ConfigError::Missing {
            name: "google_api_key".to_string(),
        });
        assert!(!missing.is_retryable());
    }

    #[test]
    fn test_record_error_message() {
        let err = AppError::from(RecordError::MissingPrimaryUrl { id: 42 });
        assert!(err.to_string().contains("[42]"));
    }
}
