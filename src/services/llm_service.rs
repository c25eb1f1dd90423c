//! LLM 服务 - 业务能力层
//!
//! 只负责"把文字和图片交给模型，拿回文本"这一能力，不关心识别还是评分
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（默认是 Gemini 的 OpenAI 兼容端点）
//! - 图片以 `data:image/png;base64,...` 的形式随用户消息发送

use std::time::Duration;

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::infrastructure::PageImage;

/// 发给模型的一段内容
#[derive(Debug, Clone)]
pub enum PromptPart {
    Text(String),
    Image(PageImage),
}

/// 视觉模型能力
///
/// 给定有序的文字 / 图片片段和模型名，返回模型输出的文本。
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn generate(&self, model: &str, parts: &[PromptPart]) -> Result<String>;
}

/// 带超时地调用模型，所有失败统一为 [`LlmError`]
pub async fn generate_with_timeout(
    model: &dyn VisionModel,
    model_name: &str,
    parts: &[PromptPart],
    timeout: Duration,
) -> Result<String, LlmError> {
    let response = tokio::time::timeout(timeout, model.generate(model_name, parts))
        .await
        .map_err(|_| LlmError::Timeout {
            model: model_name.to_string(),
            secs: timeout.as_secs(),
        })?
        .map_err(|e| LlmError::api_call_failed(model_name, format!("{:#}", e)))?;

    if response.trim().is_empty() {
        return Err(LlmError::EmptyContent {
            model: model_name.to_string(),
        });
    }
    Ok(response)
}

/// 基于 OpenAI 兼容接口的视觉模型
pub struct LlmService {
    client: Client<OpenAIConfig>,
}

impl LlmService {
    /// 创建新的 LLM 服务
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
        }
    }

    fn build_user_content(parts: &[PromptPart]) -> ChatCompletionRequestUserMessageContent {
        let content_parts = parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => ChatCompletionRequestUserMessageContentPart::Text(
                    ChatCompletionRequestMessageContentPartText { text: text.clone() },
                ),
                PromptPart::Image(image) => ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: image.to_data_url(),
                            detail: Some(ImageDetail::High),
                        },
                    },
                ),
            })
            .collect();

        ChatCompletionRequestUserMessageContent::Array(content_parts)
    }
}

#[async_trait]
impl VisionModel for LlmService {
    async fn generate(&self, model: &str, parts: &[PromptPart]) -> Result<String> {
        let image_count = parts
            .iter()
            .filter(|p| matches!(p, PromptPart::Image(_)))
            .count();
        debug!("调用 LLM API，模型: {}，包含 {} 张图片", model, image_count);

        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(Self::build_user_content(parts))
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(vec![ChatCompletionRequestMessage::User(user_msg)])
            .temperature(0.2)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    struct SlowModel;

    #[async_trait]
    impl VisionModel for SlowModel {
        async fn generate(&self, _model: &str, _parts: &[PromptPart]) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("{}".to_string())
        }
    }

    struct BlankModel;

    #[async_trait]
    impl VisionModel for BlankModel {
        async fn generate(&self, _model: &str, _parts: &[PromptPart]) -> Result<String> {
            Ok("   ".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let err = generate_with_timeout(&SlowModel, "m", &[], Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_blank_response_is_empty_content() {
        let err = generate_with_timeout(&BlankModel, "m", &[], Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent { .. }));
    }

    #[test]
    fn test_user_content_keeps_part_order() {
        let image = PageImage::from_image(&DynamicImage::new_rgb8(1, 1)).unwrap();
        let content = LlmService::build_user_content(&[
            PromptPart::Text("grade this".to_string()),
            PromptPart::Image(image),
        ]);

        match content {
            ChatCompletionRequestUserMessageContent::Array(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(
                    parts[0],
                    ChatCompletionRequestUserMessageContentPart::Text(_)
                ));
                assert!(matches!(
                    parts[1],
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(_)
                ));
            }
            _ => panic!("应为多段内容"),
        }
    }

    /// 测试真实的 Vision API
    ///
    /// 运行方式：
    /// ```bash
    /// LLM_API_KEY=... cargo test test_vision_api -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_vision_api() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::default().with_env_overrides().unwrap();
        let service = LlmService::new(&config);
        let image = PageImage::from_image(&DynamicImage::new_rgb8(64, 64)).unwrap();

        let response = service
            .generate(
                &config.llm_model_name,
                &[
                    PromptPart::Text("Describe this image in one short sentence.".to_string()),
                    PromptPart::Image(image),
                ],
            )
            .await
            .unwrap();

        println!("LLM 响应: {}", response);
        assert!(!response.is_empty());
    }
}
