//! 集成测试共用的替身实现
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use parking_lot::Mutex;

use exam_grader::error::{AppError, AppResult};
use exam_grader::infrastructure::{PageImage, PageSource};
use exam_grader::models::{StudentIdentity, StudentRecord};
use exam_grader::services::PromptPart;
use exam_grader::{Config, DocumentLoader, VisionModel};

/// 第 i 页渲染成宽度 i+1 的图片，测试里用宽度区分页面
pub struct FakeDocument {
    pages: usize,
}

impl PageSource for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages
    }

    fn render_page(&self, index: usize, _dpi: u32) -> AppResult<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            index as u32 + 1,
            1,
            Rgb([255, 255, 255]),
        )))
    }
}

/// `pages` 为 None 时模拟无法打开的文档
pub struct FakeLoader {
    pages: Option<usize>,
    pub opened: Mutex<Vec<PathBuf>>,
}

impl FakeLoader {
    pub fn with_pages(pages: usize) -> Arc<Self> {
        Arc::new(Self {
            pages: Some(pages),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn broken() -> Arc<Self> {
        Arc::new(Self {
            pages: None,
            opened: Mutex::new(Vec::new()),
        })
    }
}

impl DocumentLoader for FakeLoader {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PageSource) -> AppResult<()>,
    ) -> AppResult<()> {
        self.opened.lock().push(path.to_path_buf());
        match self.pages {
            Some(pages) => visit(&FakeDocument { pages }),
            None => Err(AppError::document_parse("PDF header not found")),
        }
    }
}

/// 按首张图片宽度返回预设结果的模型
///
/// 身份识别请求的提示里带有花名册，其余请求都视为评分。
/// 没有预设结果的宽度会返回调用失败。
#[derive(Default)]
pub struct FakeExamModel {
    identities: HashMap<u32, (String, String)>,
    grades: HashMap<u32, String>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl FakeExamModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(mut self, width: u32, id: &str, name: &str) -> Self {
        self.identities.insert(width, (id.to_string(), name.to_string()));
        self
    }

    pub fn grade(mut self, width: u32, response: &str) -> Self {
        self.grades.insert(width, response.to_string());
        self
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionModel for FakeExamModel {
    async fn generate(&self, _model: &str, parts: &[PromptPart]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let Some(PromptPart::Text(prompt)) = parts.first() else {
            anyhow::bail!("prompt must come first");
        };
        let Some(PromptPart::Image(page)) = parts.get(1) else {
            anyhow::bail!("no image attached");
        };
        let width = page.dimensions().0;

        if prompt.contains("CLASS ROSTER") {
            let (id, name) = self
                .identities
                .get(&width)
                .ok_or_else(|| anyhow::anyhow!("cannot read cover page"))?;
            Ok(format!(
                "```json\n{{\"student_id\": \"{}\", \"student_name\": \"{}\"}}\n```",
                id, name
            ))
        } else {
            self.grades
                .get(&width)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("503 Service Unavailable"))
        }
    }
}

/// 指向临时目录的测试配置
pub fn test_config(dir: &Path) -> Config {
    Config {
        upload_dir: dir.join("uploads").display().to_string(),
        export_dir: dir.join("exports").display().to_string(),
        llm_api_key: "test-key".to_string(),
        ..Config::default()
    }
}

pub fn roster_csv() -> &'static [u8] {
    b"student_id,name\n6401,Ann Lee\n6402,Bo Chen\n6403,Cy Diaz\n"
}

/// 一页答卷、宽度为 `width` 的学生
pub fn student_with_page(id: &str, name: &str, width: u32) -> StudentRecord {
    let page = PageImage::from_image(&DynamicImage::new_rgb8(width, 1)).expect("encode page");
    StudentRecord::new(
        StudentIdentity {
            student_id: id.to_string(),
            student_name: name.to_string(),
        },
        vec![page.to_base64()],
    )
}

/// 目录中剩余的文件数（目录不存在视为 0）
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
