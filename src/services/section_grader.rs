//! 单个学生的分部分评分 - 业务能力层
//!
//! 采用"先解题、再评分"的提示：模型先根据试卷结构自己作答，再与学生答案对比。
//! 只处理一个学生，失败会变成一条带错误信息的 0 分结果。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{GradingFailure, LlmError};
use crate::infrastructure::PageImage;
use crate::models::{SectionResult, StudentRecord};
use crate::services::llm_service::{generate_with_timeout, PromptPart, VisionModel};
use crate::services::response_parser::parse_json_response;
use crate::workflow::StudentCtx;

#[derive(Debug, Deserialize)]
struct GradeResponse {
    #[serde(deserialize_with = "number_or_numeric_text")]
    score: f64,
    #[serde(deserialize_with = "number_or_numeric_text")]
    total_score: f64,
    #[serde(default)]
    feedback: String,
}

fn number_or_numeric_text<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value: f64 = match JsonValue::deserialize(deserializer)? {
        JsonValue::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom(format!("无法表示的数字: {}", n)))?,
        JsonValue::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("不是数字: {}", s)))?,
        other => return Err(D::Error::custom(format!("期望数字，实际为 {}", other))),
    };

    // "NaN" / "inf" 能被 f64 解析，但不是合法分数
    if !value.is_finite() {
        return Err(D::Error::custom(format!("分数必须是有限数值: {}", value)));
    }
    Ok(value)
}

/// 一次评分需要的试卷信息
#[derive(Debug, Clone, Copy)]
pub struct GradingRequest<'a> {
    pub subject: &'a str,
    pub exam_structure: &'a str,
    pub section: &'a str,
}

pub struct SectionGrader {
    model: Arc<dyn VisionModel>,
    model_name: String,
    timeout: Duration,
}

impl SectionGrader {
    pub fn new(model: Arc<dyn VisionModel>, config: &Config) -> Self {
        Self {
            model,
            model_name: config.llm_model_name.clone(),
            timeout: Duration::from_secs(config.llm_timeout_secs),
        }
    }

    /// 评分并把失败转换为错误结果
    pub async fn grade(
        &self,
        ctx: &StudentCtx,
        student: &StudentRecord,
        request: GradingRequest<'_>,
    ) -> SectionResult {
        match self.grade_student(ctx, student, request).await {
            Ok(result) => {
                info!("{} ✓ 得分 {}/{}", ctx, result.score, result.total_score);
                result
            }
            Err(failure) => {
                warn!("{} ❌ {}", ctx, failure);
                SectionResult::failed(failure.source.to_string())
            }
        }
    }

    /// 评分单个学生的单个部分
    pub async fn grade_student(
        &self,
        ctx: &StudentCtx,
        student: &StudentRecord,
        request: GradingRequest<'_>,
    ) -> Result<SectionResult, GradingFailure> {
        let failure = |source| GradingFailure {
            student_id: student.id.clone(),
            source,
        };

        let images = decode_page_images(&student.page_images).map_err(failure)?;
        debug!("{} 发送 {} 张答卷图片", ctx, images.len());

        let mut parts = Vec::with_capacity(images.len() + 1);
        parts.push(PromptPart::Text(build_grading_prompt(request)));
        parts.extend(images.into_iter().map(PromptPart::Image));

        let response =
            generate_with_timeout(self.model.as_ref(), &self.model_name, &parts, self.timeout)
                .await
                .map_err(failure)?;
        debug!("{} 评分响应: {}", ctx, response);

        let grade: GradeResponse = parse_json_response(&response).map_err(failure)?;
        Ok(SectionResult::graded(grade.score, grade.total_score, grade.feedback))
    }
}

/// 把存储的 base64 还原为 PNG
fn decode_page_images(stored: &[String]) -> Result<Vec<PageImage>, LlmError> {
    if stored.is_empty() {
        return Err(LlmError::InvalidImage("学生记录没有答卷图片".to_string()));
    }
    stored.iter().map(|s| PageImage::from_base64(s)).collect()
}

fn build_grading_prompt(request: GradingRequest<'_>) -> String {
    format!(
        r#"**MISSION:** You are an expert University Professor for the subject: **{subject}**. Your task is to grade a student's answer for one specific part of an exam.
**CONTEXT:** You will grade ONLY the part named: "{section}".
**YOUR TASK (Solve-then-Grade Chain of Thought):**
1.  **Analyze the Question & Generate a Solution:** First, solve the problem yourself based on the exam structure.
2.  **Analyze Student's Work:** Examine the student's answer in the provided images.
3.  **Compare and Grade:** Compare the student's work against your solution and the rubric.
4.  **Provide Feedback & Output JSON:** Write clear, constructive feedback and return a single, valid JSON object with score, total_score, and feedback.
**REQUIRED JSON OUTPUT FORMAT:** ```json{{"score": <number>, "total_score": <number>, "feedback": "<string>"}}```
---
**FULL EXAM STRUCTURE:**
```text
{structure}
```
---
**STUDENT'S ANSWER IMAGES:**
"#,
        subject = request.subject,
        section = request.section,
        structure = request.exam_structure,
    )
}
