/// LLM API 客户端
///
/// 封装所有与 LLM API 相关的调用逻辑
///
/// 走 OpenAI 兼容接口，默认指向 Anthropic 的兼容端点。
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, LlmError};

/// LLM 客户端
#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model_name: String,
    timeout: Duration,
}

impl LlmClient {
    /// 创建新的 LLM 客户端
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// 发送聊天请求
    ///
    /// # 参数
    /// - `system_message`: 系统消息
    /// - `user_message`: 用户消息内容
    /// - `max_tokens`: 最大输出长度
    ///
    /// # 返回
    /// 返回 LLM 的响应内容（已去除首尾空白）
    pub async fn chat(
        &self,
        system_message: &str,
        user_message: &str,
        max_tokens: u32,
    ) -> AppResult<String> {
        debug!("正在调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", user_message.len());

        let build_failed = |e| AppError::llm_api_failed(&self.model_name, e);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_message)
            .build()
            .map_err(build_failed)?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()
            .map_err(build_failed)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.3)
            .max_tokens(max_tokens)
            .build()
            .map_err(build_failed)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout {
                model: self.model_name.clone(),
                secs: self.timeout.as_secs(),
            })?
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                AppError::llm_api_failed(&self.model_name, e)
            })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }
}
