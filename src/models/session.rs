use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::student::{MergeOutcome, RegradePolicy, ScorePatch, StudentRecord};

/// 一次阅卷会话
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSession {
    pub session_id: String,
    pub session_name: String,
    pub subject: String,
    /// 试卷结构说明，部分名称与评分标准都以它为准
    pub exam_structure: String,
    /// 从试卷结构中提取的部分名称，保持出现顺序
    pub sections: Vec<String>,
    pub students: Vec<StudentRecord>,
    pub created_at: String,
}

/// 合并补丁的统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub applied: usize,
    pub kept_verified: usize,
}

impl ExamSession {
    pub fn new(
        session_id: impl Into<String>,
        session_name: impl Into<String>,
        subject: impl Into<String>,
        exam_structure: impl Into<String>,
        students: Vec<StudentRecord>,
    ) -> Self {
        let exam_structure = exam_structure.into();
        Self {
            session_id: session_id.into(),
            session_name: session_name.into(),
            subject: subject.into(),
            sections: extract_sections(&exam_structure),
            exam_structure,
            students,
            created_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// 该部分已人工确认的成绩数量
    pub fn verified_count(&self, section: &str) -> usize {
        self.students.iter().filter(|s| s.is_verified(section)).count()
    }

    /// 合并一次评分产生的补丁
    pub fn apply_patches(&mut self, patches: Vec<ScorePatch>, policy: RegradePolicy) -> MergeStats {
        let mut stats = MergeStats::default();
        for patch in patches {
            let Some(student) = self.students.get_mut(patch.record_index) else {
                warn!("补丁指向不存在的学生记录 #{}，已忽略", patch.record_index);
                continue;
            };
            match student.apply_section_result(&patch.section, patch.result, policy) {
                MergeOutcome::Applied => stats.applied += 1,
                MergeOutcome::KeptVerified => stats.kept_verified += 1,
            }
        }
        stats
    }

    /// 保存人工确认的分数
    ///
    /// 学号相同的记录会得到同一个分数；该部分尚未评分的记录不受影响。
    /// 返回更新的结果数量。
    pub fn apply_verification(&mut self, section: &str, scores: &HashMap<String, f64>) -> usize {
        let mut updated = 0;
        for student in self.students.iter_mut() {
            let Some(&score) = scores.get(&student.id) else {
                continue;
            };
            if student.verify_score(section, score) {
                updated += 1;
            } else {
                warn!("学生 {} 的部分 '{}' 尚未评分，忽略确认分数", student.id, section);
            }
        }
        updated
    }

    pub fn find_student(&self, student_id: &str) -> Option<&StudentRecord> {
        self.students.iter().find(|s| s.id == student_id)
    }
}

fn section_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?im)^(Part .*?):").expect("section pattern is valid"))
}

/// 从试卷结构中提取部分名称（形如 `Part 1: ...` 的行）
pub fn extract_sections(exam_structure: &str) -> Vec<String> {
    section_pattern()
        .captures_iter(exam_structure)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
