//! PDF 文档 - 基础设施层
//!
//! 持有 pdfium 资源，只暴露"数页数"和"渲染某一页"两种能力

use std::path::{Path, PathBuf};

use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// PDF 坐标单位：每英寸 72 点
const POINTS_PER_INCH: f32 = 72.0;

/// 一份已打开、可按页渲染的文档
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// 以指定 DPI 渲染第 `index` 页（从 0 开始）
    fn render_page(&self, index: usize, dpi: u32) -> AppResult<DynamicImage>;
}

/// 文档加载器
///
/// 文档只在 `visit` 回调期间有效，回调返回后底层资源即被释放。
pub trait DocumentLoader: Send + Sync {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PageSource) -> AppResult<()>,
    ) -> AppResult<()>;
}

/// 基于 pdfium 的加载器
///
/// 每次打开文档时绑定一次动态库，可以安全地在 `spawn_blocking` 中使用。
#[derive(Debug, Clone, Default)]
pub struct PdfiumLoader {
    library_path: Option<PathBuf>,
}

impl PdfiumLoader {
    pub fn new(library_path: Option<PathBuf>) -> Self {
        Self { library_path }
    }

    fn bind(&self) -> AppResult<Pdfium> {
        let bindings = match &self.library_path {
            Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                .or_else(|_| Pdfium::bind_to_system_library()),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| AppError::Other(format!("加载 Pdfium 库失败: {:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl DocumentLoader for PdfiumLoader {
    fn with_document(
        &self,
        path: &Path,
        visit: &mut dyn FnMut(&dyn PageSource) -> AppResult<()>,
    ) -> AppResult<()> {
        let pdfium = self.bind()?;
        let document = pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| AppError::document_parse(format!("无法打开 PDF: {:?}", e)))?;

        let pages = PdfiumPages { document };
        debug!("PDF 加载成功: {} 页", pages.page_count());
        visit(&pages)
    }
}

struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl PageSource for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&self, index: usize, dpi: u32) -> AppResult<DynamicImage> {
        let page_index = u16::try_from(index)
            .map_err(|_| AppError::document_parse(format!("页码超出范围: {}", index)))?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| AppError::document_parse(format!("获取第 {} 页失败: {:?}", index + 1, e)))?;

        let config = PdfRenderConfig::new().scale_page_by_factor(dpi as f32 / POINTS_PER_INCH);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| AppError::document_parse(format!("渲染第 {} 页失败: {:?}", index + 1, e)))?;

        // 扫描件不需要透明通道
        Ok(DynamicImage::ImageRgb8(bitmap.as_image().to_rgb8()))
    }
}
