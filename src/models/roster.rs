//! 花名册
//!
//! 上传的 CSV（首行为表头），只用于拼进识别提示词，供 AI 对照。

use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Roster {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Roster {
    /// 解析 CSV 内容
    pub fn from_csv_bytes(bytes: &[u8]) -> AppResult<Self> {
        // 去掉 Excel 导出时常带的 BOM
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(bytes);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if headers.iter().all(|h| h.is_empty()) {
            return Err(AppError::Roster("缺少表头".to_string()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 渲染为对齐的文本表格（左侧带行号），用于提示词和日志
    pub fn to_prompt_text(&self) -> String {
        let index_width = self.rows.len().saturating_sub(1).to_string().len();
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(len),
                    None => widths.push(len),
                }
            }
        }

        let format_line = |index: &str, cells: &[String]| -> String {
            let mut line = format!("{:<width$}", index, width = index_width);
            for (i, width) in widths.iter().enumerate() {
                let cell = cells.get(i).map(String::as_str).unwrap_or("");
                line.push_str("  ");
                line.push_str(&format!("{:<width$}", cell, width = *width));
            }
            line.trim_end().to_string()
        };

        let mut lines = vec![format_line("", &self.headers)];
        for (index, row) in self.rows.iter().enumerate() {
            lines.push(format_line(&index.to_string(), row));
        }
        lines.join("\n")
    }
}
