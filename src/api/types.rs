//! HTTP 请求与响应结构

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{ExamSession, SectionResult, StudentRecord};
use crate::orchestrator::GradingSummary;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// 会话概览（不含答卷图片）
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_name: String,
    pub subject: String,
    pub exam_structure: String,
    pub sections: Vec<String>,
    pub created_at: String,
    pub students: Vec<StudentSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StudentSummary {
    pub id: String,
    pub name: String,
    pub page_count: usize,
    pub scores: HashMap<String, SectionResult>,
}

/// 某一部分的复核列表中的一行
#[derive(Debug, Serialize, Deserialize)]
pub struct SectionRow {
    pub record_index: usize,
    pub student_id: String,
    pub student_name: String,
    /// 尚未评分时为空
    pub result: Option<SectionResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionView {
    pub session_id: String,
    pub section: String,
    pub rows: Vec<SectionRow>,
}

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub section: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GradeResponse {
    pub graded: usize,
    pub failed: usize,
    pub skipped_verified: usize,
    pub applied: usize,
    #[serde(flatten)]
    pub view: SectionView,
}

#[derive(Debug, Deserialize)]
pub struct SaveScoresRequest {
    pub section: String,
    pub scores: HashMap<String, f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SaveScoresResponse {
    pub section: String,
    pub updated: usize,
}

impl From<&StudentRecord> for StudentSummary {
    fn from(student: &StudentRecord) -> Self {
        Self {
            id: student.id.clone(),
            name: student.name.clone(),
            page_count: student.page_images.len(),
            scores: student.scores.clone(),
        }
    }
}

impl From<&ExamSession> for SessionSummary {
    fn from(session: &ExamSession) -> Self {
        Self {
            session_id: session.session_id.clone(),
            session_name: session.session_name.clone(),
            subject: session.subject.clone(),
            exam_structure: session.exam_structure.clone(),
            sections: session.sections.clone(),
            created_at: session.created_at.clone(),
            students: session.students.iter().map(StudentSummary::from).collect(),
        }
    }
}

impl SectionView {
    pub fn new(session: &ExamSession, section: &str) -> Self {
        let rows = session
            .students
            .iter()
            .enumerate()
            .map(|(record_index, student)| SectionRow {
                record_index,
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                result: student.scores.get(section).cloned(),
            })
            .collect();
        Self {
            session_id: session.session_id.clone(),
            section: section.to_string(),
            rows,
        }
    }
}

impl GradeResponse {
    pub fn new(summary: GradingSummary, view: SectionView) -> Self {
        Self {
            graded: summary.graded,
            failed: summary.failed,
            skipped_verified: summary.skipped_verified,
            applied: summary.merge.applied,
            view,
        }
    }
}
