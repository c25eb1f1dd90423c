use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 识别失败时使用的学生姓名
pub const UNKNOWN_STUDENT_NAME: &str = "Unknown";

/// 一名学生（一组页面）的记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudentRecord {
    /// AI 识别出的学号，或 `student_<序号>`，不保证唯一
    pub id: String,
    pub name: String,
    /// 每页渲染后的 PNG（base64），按页码顺序
    pub page_images: Vec<String>,
    /// 部分名称 → 评分结果
    #[serde(default)]
    pub scores: HashMap<String, SectionResult>,
}

/// 某个部分的评分结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionResult {
    pub score: f64,
    pub total_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionResult {
    /// AI 评分成功
    pub fn graded(score: f64, total_score: f64, feedback: impl Into<String>) -> Self {
        Self {
            score,
            total_score,
            feedback: Some(feedback.into()),
            verified: false,
            error: None,
        }
    }

    /// AI 评分失败：0 分并附带错误信息
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            total_score: 0.0,
            feedback: None,
            verified: false,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// AI 识别出的身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentIdentity {
    pub student_id: String,
    pub student_name: String,
}

impl StudentIdentity {
    /// 第 `chunk_index` 组（从 0 开始）的兜底身份
    pub fn fallback(chunk_index: usize) -> Self {
        Self {
            student_id: format!("student_{}", chunk_index + 1),
            student_name: UNKNOWN_STUDENT_NAME.to_string(),
        }
    }
}

/// 重新评分时对已人工确认成绩的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegradePolicy {
    /// 直接覆盖，确认状态被重置
    #[default]
    Overwrite,
    /// 保留已确认的成绩，这些学生不再送 AI 评分
    KeepVerified,
    /// 只要该部分存在已确认的成绩就拒绝整次评分
    Reject,
}

impl FromStr for RegradePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "keep_verified" | "keep-verified" => Ok(Self::KeepVerified),
            "reject" => Ok(Self::Reject),
            other => Err(format!("未知的重新评分策略: {}", other)),
        }
    }
}

impl fmt::Display for RegradePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Overwrite => "overwrite",
            Self::KeepVerified => "keep_verified",
            Self::Reject => "reject",
        };
        f.write_str(name)
    }
}

/// 一次评分产生的补丁：第 `record_index` 个学生的 `section` 结果
#[derive(Debug, Clone, PartialEq)]
pub struct ScorePatch {
    pub record_index: usize,
    pub section: String,
    pub result: SectionResult,
}

/// 合并补丁的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// 新结果已写入
    Applied,
    /// 原结果已人工确认，按策略保留
    KeptVerified,
}

impl StudentRecord {
    pub fn new(identity: StudentIdentity, page_images: Vec<String>) -> Self {
        Self {
            id: identity.student_id,
            name: identity.student_name,
            page_images,
            scores: HashMap::new(),
        }
    }

    /// 写入某个部分的评分结果（同一部分后写覆盖先写）
    ///
    /// `KeepVerified` 下已确认的结果不会被替换；`Reject` 的拦截发生在评分之前，
    /// 到这里时与 `Overwrite` 行为一致。
    pub fn apply_section_result(
        &mut self,
        section: &str,
        result: SectionResult,
        policy: RegradePolicy,
    ) -> MergeOutcome {
        if policy == RegradePolicy::KeepVerified && self.is_verified(section) {
            return MergeOutcome::KeptVerified;
        }
        self.scores.insert(section.to_string(), result);
        MergeOutcome::Applied
    }

    pub fn is_verified(&self, section: &str) -> bool {
        self.scores.get(section).is_some_and(|r| r.verified)
    }

    /// 人工确认分数，未评分的部分不会被创建
    pub fn verify_score(&mut self, section: &str, score: f64) -> bool {
        match self.scores.get_mut(section) {
            Some(result) => {
                result.score = score;
                result.verified = true;
                true
            }
            None => false,
        }
    }

    /// 导出用的分数：未评分按 0 计
    pub fn score_for(&self, section: &str) -> f64 {
        self.scores.get(section).map(|r| r.score).unwrap_or(0.0)
    }
}
