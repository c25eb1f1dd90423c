//! 成绩导出
//!
//! 每名学生一行：学号、姓名、各部分分数、总分。未评分的部分按 0 分计。

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::ExamSession;

/// Excel 需要 BOM 才能正确识别 UTF-8
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 生成 CSV 内容（带 BOM）
pub fn render_csv(session: &ExamSession) -> AppResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());

    let mut header = vec!["student_id".to_string(), "student_name".to_string()];
    header.extend(session.sections.iter().cloned());
    header.push("total_score".to_string());
    writer.write_record(&header)?;

    for student in &session.students {
        let mut row = vec![student.id.clone(), student.name.clone()];
        let mut total = 0.0;
        for section in &session.sections {
            let score = student.score_for(section);
            total += score;
            row.push(format_score(score));
        }
        row.push(format_score(total));
        writer.write_record(&row)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Other(format!("CSV 写入失败: {}", e)))
}

/// 把 CSV 写入导出目录，返回文件路径和内容
pub fn write_export(session: &ExamSession, export_dir: &Path) -> AppResult<(PathBuf, Vec<u8>)> {
    let content = render_csv(session)?;
    let path = export_dir.join(export_file_name(&session.session_name));

    let write = || -> std::io::Result<()> {
        std::fs::create_dir_all(export_dir)?;
        std::fs::write(&path, &content)
    };
    write().map_err(|e| AppError::Export {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    info!("成绩已导出到: {}", path.display());
    Ok((path, content))
}

/// `Results_<安全化的会话名>.csv`
pub fn export_file_name(session_name: &str) -> String {
    let cleaned: String = session_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();
    let safe = cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let safe = safe.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if safe.is_empty() {
        "Results_session.csv".to_string()
    } else {
        format!("Results_{}.csv", safe)
    }
}

/// 整数分数不带小数点
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e15 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RegradePolicy, SectionResult, StudentIdentity, StudentRecord};

    fn session() -> ExamSession {
        let mut a = StudentRecord::new(
            StudentIdentity {
                student_id: "A".to_string(),
                student_name: "Alice".to_string(),
            },
            vec![],
        );
        let policy = RegradePolicy::Overwrite;
        a.apply_section_result("Part 1", SectionResult::graded(8.0, 10.0, "ok"), policy);
        a.apply_section_result("Part 2", SectionResult::graded(2.5, 5.0, "ok"), policy);

        let mut b = StudentRecord::new(
            StudentIdentity {
                student_id: "B".to_string(),
                student_name: "Bob, Jr.".to_string(),
            },
            vec![],
        );
        b.apply_section_result("Part 1", SectionResult::failed("LLM 调用超时"), policy);

        ExamSession::new(
            "s",
            "Midterm_2024/Physics",
            "Physics",
            "Part 1: mechanics\nPart 2: waves",
            vec![a, b],
        )
    }

    #[test]
    fn test_render_csv() {
        let bytes = render_csv(&session()).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));

        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "student_id,student_name,Part 1,Part 2,total_score");
        assert_eq!(lines[1], "A,Alice,8,2.5,10.5");
        assert_eq!(lines[2], "B,\"Bob, Jr.\",0,0,0");
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("Midterm_2024/Physics"), "Results_Midterm 2024 Physics.csv");
        assert_eq!(export_file_name("  ../.. "), "Results_session.csv");
        assert_eq!(export_file_name("ข้อสอบ"), "Results_session.csv");
    }

    #[test]
    fn test_write_export() {
        let dir = tempfile::tempdir().unwrap();
        let (path, content) = write_export(&session(), &dir.path().join("out")).unwrap();
        assert!(path.ends_with("Results_Midterm 2024 Physics.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), content);
    }

    #[test]
    fn test_format_score() {
        assert_eq!(format_score(8.0), "8");
        assert_eq!(format_score(0.0), "0");
        assert_eq!(format_score(7.25), "7.25");
    }
}
