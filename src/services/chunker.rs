//! 按固定页数把文档切分为每名学生一组

use std::ops::Range;

use crate::error::{AppError, AppResult};

/// 分组方案
///
/// 只记录页数和每组页数，可以反复迭代。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageChunks {
    page_count: usize,
    pages_per_student: usize,
}

impl PageChunks {
    /// 参数为有符号数，以便拒绝负数输入
    pub fn new(page_count: i64, pages_per_student: i64) -> AppResult<Self> {
        if pages_per_student <= 0 {
            return Err(AppError::invalid_input(format!(
                "每名学生的页数必须大于 0，实际为 {}",
                pages_per_student
            )));
        }
        if page_count < 0 {
            return Err(AppError::invalid_input(format!(
                "页数不能为负数，实际为 {}",
                page_count
            )));
        }
        let as_usize = |v: i64| {
            usize::try_from(v).map_err(|_| AppError::invalid_input(format!("数值过大: {}", v)))
        };
        Ok(Self {
            page_count: as_usize(page_count)?,
            pages_per_student: as_usize(pages_per_student)?,
        })
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn pages_per_student(&self) -> usize {
        self.pages_per_student
    }

    /// 分组数量：`ceil(page_count / pages_per_student)`
    pub fn len(&self) -> usize {
        self.page_count.div_ceil(self.pages_per_student)
    }

    pub fn is_empty(&self) -> bool {
        self.page_count == 0
    }

    pub fn iter(&self) -> ChunkIter {
        ChunkIter {
            next_start: 0,
            page_count: self.page_count,
            pages_per_student: self.pages_per_student,
        }
    }
}

impl IntoIterator for PageChunks {
    type Item = Range<usize>;
    type IntoIter = ChunkIter;

    fn into_iter(self) -> ChunkIter {
        self.iter()
    }
}

impl IntoIterator for &PageChunks {
    type Item = Range<usize>;
    type IntoIter = ChunkIter;

    fn into_iter(self) -> ChunkIter {
        self.iter()
    }
}

/// 逐组产出 `[起始页, 结束页)`
#[derive(Debug, Clone)]
pub struct ChunkIter {
    next_start: usize,
    page_count: usize,
    pages_per_student: usize,
}

impl Iterator for ChunkIter {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.next_start >= self.page_count {
            return None;
        }
        let start = self.next_start;
        let end = start.saturating_add(self.pages_per_student).min(self.page_count);
        self.next_start = end;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.page_count - self.next_start.min(self.page_count))
            .div_ceil(self.pages_per_student);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkIter {}
