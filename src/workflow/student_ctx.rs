//! 处理上下文
//!
//! 封装"我正在处理第几组页面 / 哪个学生的哪个部分"这一信息，主要用于日志前缀

use std::fmt::Display;
use std::ops::Range;

/// 入库阶段：一组页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCtx {
    /// 分组序号（从0开始）
    pub chunk_index: usize,

    /// 页码范围 `[start, end)`（从0开始）
    pub pages: Range<usize>,
}

impl ChunkCtx {
    pub fn new(chunk_index: usize, pages: Range<usize>) -> Self {
        Self { chunk_index, pages }
    }
}

impl Display for ChunkCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[分组 #{} 页 {}-{}]",
            self.chunk_index + 1,
            self.pages.start + 1,
            self.pages.end
        )
    }
}

/// 评分阶段：某个学生的某个部分
#[derive(Debug, Clone)]
pub struct StudentCtx {
    /// 学生在会话中的位置（补丁按它合并）
    pub record_index: usize,

    pub student_id: String,

    pub section: String,
}

impl StudentCtx {
    pub fn new(
        record_index: usize,
        student_id: impl Into<String>,
        section: impl Into<String>,
    ) -> Self {
        Self {
            record_index,
            student_id: student_id.into(),
            section: section.into(),
        }
    }
}

impl Display for StudentCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[学生 #{} ID#{} 部分#{}]",
            self.record_index + 1,
            self.student_id,
            self.section
        )
    }
}
