//! 身份识别服务 - 业务能力层
//!
//! 只处理一组页面：把首页图片和花名册交给模型，拿回学号和姓名。
//! 任何失败都退回到 `student_<序号>` / `Unknown`，不会中断整批处理。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::IdentificationFailure;
use crate::infrastructure::PageImage;
use crate::models::StudentIdentity;
use crate::services::llm_service::{generate_with_timeout, PromptPart, VisionModel};
use crate::services::response_parser::parse_json_response;
use crate::workflow::ChunkCtx;

/// 模型返回的身份信息，字段都可能缺失
#[derive(Debug, Deserialize)]
struct IdentityResponse {
    #[serde(default, deserialize_with = "text_or_number")]
    student_id: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    student_name: Option<String>,
}

/// 学号经常被模型写成数字
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// 一组页面的识别结果
#[derive(Debug)]
pub enum Resolution {
    Identified(StudentIdentity),
    /// 识别失败，已使用兜底身份
    Fallback {
        identity: StudentIdentity,
        failure: IdentificationFailure,
    },
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Resolution::Fallback { .. })
    }

    pub fn into_identity(self) -> StudentIdentity {
        match self {
            Resolution::Identified(identity) | Resolution::Fallback { identity, .. } => identity,
        }
    }
}

pub struct IdentityResolver {
    model: Arc<dyn VisionModel>,
    model_name: String,
    timeout: Duration,
}

impl IdentityResolver {
    pub fn new(model: Arc<dyn VisionModel>, config: &Config) -> Self {
        Self {
            model,
            model_name: config.llm_model_name.clone(),
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    /// 识别一组页面的学生身份，失败时返回兜底身份
    pub async fn resolve(
        &self,
        ctx: &ChunkCtx,
        first_page: &PageImage,
        roster_text: &str,
    ) -> Resolution {
        match self.identify(ctx, first_page, roster_text).await {
            Ok(identity) => {
                info!("{} ✓ 识别为 {} ({})", ctx, identity.student_id, identity.student_name);
                Resolution::Identified(identity)
            }
            Err(failure) => {
                let identity = StudentIdentity::fallback(ctx.chunk_index);
                warn!("{} ⚠️ {}，使用默认身份 {}", ctx, failure, identity.student_id);
                Resolution::Fallback { identity, failure }
            }
        }
    }

    /// 识别一组页面的学生身份
    ///
    /// 响应中缺失的字段单独退回默认值。
    pub async fn identify(
        &self,
        ctx: &ChunkCtx,
        first_page: &PageImage,
        roster_text: &str,
    ) -> Result<StudentIdentity, IdentificationFailure> {
        let failure = |source| IdentificationFailure {
            chunk_index: ctx.chunk_index,
            source,
        };

        let parts = [
            PromptPart::Text(build_identification_prompt(roster_text)),
            PromptPart::Image(first_page.clone()),
        ];

        let response =
            generate_with_timeout(self.model.as_ref(), &self.model_name, &parts, self.timeout)
                .await
                .map_err(failure)?;
        debug!("{} 识别响应: {}", ctx, response);

        let parsed: IdentityResponse = parse_json_response(&response).map_err(failure)?;
        let fallback = StudentIdentity::fallback(ctx.chunk_index);

        Ok(StudentIdentity {
            student_id: parsed.student_id.unwrap_or(fallback.student_id),
            student_name: parsed.student_name.unwrap_or(fallback.student_name),
        })
    }
}

fn build_identification_prompt(roster_text: &str) -> String {
    format!(
        r#"**MISSION:** You are an AI assistant specializing in student identification from scanned exam papers.

**TASK:**
1. Read the handwritten or printed student ID and full name on the attached exam page (usually on the cover or header).
2. Cross-check what you read against the official class roster below and correct obvious misreadings to the closest roster entry.
3. If the page does not show a readable ID or name, use your best match from the roster; never invent a student.

**CLASS ROSTER:**
```text
{}
```

**REQUIRED JSON OUTPUT FORMAT (return only this object):**
```json
{{"student_id": "<string>", "student_name": "<string>"}}
```"#,
        roster_text
    )
}
