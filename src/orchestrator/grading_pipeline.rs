//! 分部分评分流水线 - 编排层
//!
//! ## 职责
//!
//! 对会话中所有学生的某一部分评分，产出 `ScorePatch` 并合并回会话。
//!
//! ## 并发与一致性
//!
//! - 评分基于会话快照进行，模型调用期间不持有存储锁
//! - 结果以补丁形式在一次 `update` 中写回；学生数量变化时整批丢弃
//! - 单个学生失败只会得到一条错误结果，不会中断其他学生

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{ExamSession, MergeStats, RegradePolicy, ScorePatch, StudentRecord};
use crate::services::{GradingRequest, SectionGrader, SessionStore, VisionModel};
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::StudentCtx;

/// 一次评分的汇总
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GradingSummary {
    /// 实际送去评分的学生数
    pub graded: usize,
    /// 其中评分失败（记录为错误结果）的数量
    pub failed: usize,
    /// 因已人工确认而跳过的数量
    pub skipped_verified: usize,
    pub merge: MergeStats,
}

pub struct GradingPipeline {
    grader: SectionGrader,
    policy: RegradePolicy,
    max_concurrent: usize,
}

impl GradingPipeline {
    pub fn new(model: Arc<dyn VisionModel>, config: &Config) -> Self {
        Self {
            grader: SectionGrader::new(model, config),
            policy: config.regrade_policy,
            max_concurrent: config.max_concurrent_requests.max(1),
        }
    }

    /// 评分所有学生的某一部分并返回更新后的记录
    pub async fn grade_records(
        &self,
        students: Vec<StudentRecord>,
        request: GradingRequest<'_>,
    ) -> AppResult<Vec<StudentRecord>> {
        let mut session =
            ExamSession::new("", "", request.subject, request.exam_structure, students);
        let patches = self.grade_section(&session, request.section).await?;
        session.apply_patches(patches, self.policy);
        Ok(session.students)
    }

    /// 基于会话快照评分，返回待合并的补丁
    ///
    /// `Reject` 策略下，只要该部分存在已确认的成绩就拒绝评分；
    /// `KeepVerified` 策略下，已确认的学生不会再送去评分。
    pub async fn grade_section(
        &self,
        session: &ExamSession,
        section: &str,
    ) -> AppResult<Vec<ScorePatch>> {
        let section = section.trim();
        if section.is_empty() {
            return Err(AppError::invalid_input("评分部分不能为空"));
        }
        if !session.sections.iter().any(|s| s == section) {
            warn!("⚠️ 部分 '{}' 不在试卷结构中，仍按请求评分", section);
        }

        let verified = session.verified_count(section);
        if self.policy == RegradePolicy::Reject && verified > 0 {
            return Err(AppError::RegradeBlocked {
                section: section.to_string(),
                verified,
            });
        }

        let request = GradingRequest {
            subject: &session.subject,
            exam_structure: &session.exam_structure,
            section,
        };
        let skip_verified = self.policy == RegradePolicy::KeepVerified;
        let pending: Vec<usize> = session
            .students
            .iter()
            .enumerate()
            .filter(|(_, student)| !(skip_verified && student.is_verified(section)))
            .map(|(record_index, _)| record_index)
            .collect();

        let label = format!("评分 {}", section);
        log_batch_start(&label, pending.len());
        if pending.len() < session.students.len() {
            info!(
                "跳过 {} 名已确认成绩的学生",
                session.students.len() - pending.len()
            );
        }

        let grader = &self.grader;
        let students = &session.students;
        let patches: Vec<ScorePatch> = stream::iter(pending)
            .map(|record_index| {
                let student = &students[record_index];
                async move {
                    let ctx = StudentCtx::new(record_index, student.id.as_str(), section);
                    ScorePatch {
                        record_index,
                        section: section.to_string(),
                        result: grader.grade(&ctx, student, request).await,
                    }
                }
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let failed = patches.iter().filter(|p| p.result.is_error()).count();
        log_batch_complete(&label, patches.len() - failed, failed);
        Ok(patches)
    }

    /// 评分存储中的会话并把结果写回
    pub async fn grade_stored_session(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        section: &str,
    ) -> AppResult<GradingSummary> {
        let snapshot = store
            .get(session_id)
            .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))?;
        let section = section.trim();

        let patches = self.grade_section(&snapshot, section).await?;
        let mut summary = GradingSummary {
            graded: patches.len(),
            failed: patches.iter().filter(|p| p.result.is_error()).count(),
            skipped_verified: snapshot.students.len() - patches.len(),
            merge: MergeStats::default(),
        };

        let expected_students = snapshot.students.len();
        let policy = self.policy;
        let mut patches = Some(patches);
        store.update(session_id, &mut |session: &mut ExamSession| {
            let Some(patches) = patches.take() else { return };
            if session.students.len() != expected_students {
                warn!(
                    "⚠️ 会话 {} 的学生数量已变化 ({} → {})，丢弃本次评分结果",
                    session_id,
                    expected_students,
                    session.students.len()
                );
                return;
            }
            summary.merge = session.apply_patches(patches, policy);
        })?;

        info!(
            "会话 {} 部分 '{}' 已写回 {} 条结果",
            session_id, section, summary.merge.applied
        );
        Ok(summary)
    }
}
