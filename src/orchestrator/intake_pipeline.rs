//! 批量入库流水线 - 编排层
//!
//! ## 职责
//!
//! 把一份合订的 PDF 拆成每名学生一组页面，并识别每组的学生身份。
//!
//! ## 处理步骤
//!
//! 1. 上传内容落盘到临时文件（返回前无论成败都会删除）
//! 2. 在阻塞线程中打开文档，按组渲染所有页面为 PNG → base64
//! 3. 按组调用身份识别，受 `max_concurrent_requests` 限制，结果保持文档顺序
//! 4. 生成不含成绩的 `StudentRecord` 列表
//!
//! 单页渲染失败视为整份文档不可读；单组识别失败只影响该组（使用默认身份）。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{DocumentLoader, PageImage, PageSource, TempUpload};
use crate::models::{Roster, StudentRecord};
use crate::services::{IdentityResolver, PageChunks, Resolution, VisionModel};
use crate::utils::logging::{log_batch_complete, log_batch_start};
use crate::workflow::ChunkCtx;

/// 一组已渲染的页面
struct RenderedChunk {
    ctx: ChunkCtx,
    /// 首页单独保留原始 PNG，供身份识别使用
    first_page: PageImage,
    page_images: Vec<String>,
}

pub struct IntakePipeline {
    loader: Arc<dyn DocumentLoader>,
    resolver: IdentityResolver,
    upload_dir: PathBuf,
    render_dpi: u32,
    max_concurrent: usize,
}

impl IntakePipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        model: Arc<dyn VisionModel>,
        config: &Config,
    ) -> Self {
        Self {
            loader,
            resolver: IdentityResolver::new(model, config),
            upload_dir: PathBuf::from(&config.upload_dir),
            render_dpi: config.render_dpi,
            max_concurrent: config.max_concurrent_requests.max(1),
        }
    }

    /// 处理一份上传的合订文档
    ///
    /// # 参数
    /// - `document`: PDF 原始字节
    /// - `pages_per_student`: 每名学生的页数，必须大于 0
    /// - `roster`: 班级花名册
    pub async fn run(
        &self,
        document: Vec<u8>,
        pages_per_student: i64,
        roster: &Roster,
    ) -> AppResult<Vec<StudentRecord>> {
        // 先校验参数，避免无效请求落盘
        PageChunks::new(0, pages_per_student)?;

        let upload = TempUpload::persist(&self.upload_dir, &document, ".pdf")?;
        drop(document);

        let loader = Arc::clone(&self.loader);
        let dpi = self.render_dpi;
        let chunks = tokio::task::spawn_blocking(move || {
            let rendered = render_chunks(loader.as_ref(), upload.path(), pages_per_student, dpi);
            upload.remove();
            rendered
        })
        .await??;

        if chunks.is_empty() {
            warn!("⚠️ 文档没有任何页面，会话中不会有学生");
            return Ok(Vec::new());
        }

        self.identify_chunks(chunks, roster).await
    }

    /// 逐组识别身份，组装学生记录
    async fn identify_chunks(
        &self,
        chunks: Vec<RenderedChunk>,
        roster: &Roster,
    ) -> AppResult<Vec<StudentRecord>> {
        let label = "身份识别";
        log_batch_start(label, chunks.len());

        let roster_text = roster.to_prompt_text();
        let resolver = &self.resolver;
        let roster_text = roster_text.as_str();

        let resolved: Vec<(Resolution, Vec<String>)> = stream::iter(chunks)
            .map(|chunk| async move {
                let resolution = resolver.resolve(&chunk.ctx, &chunk.first_page, roster_text).await;
                (resolution, chunk.page_images)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let failed = resolved.iter().filter(|(r, _)| r.is_fallback()).count();
        log_batch_complete(label, resolved.len() - failed, failed);

        Ok(resolved
            .into_iter()
            .map(|(resolution, images)| StudentRecord::new(resolution.into_identity(), images))
            .collect())
    }
}

/// 打开文档并按组渲染所有页面（阻塞）
fn render_chunks(
    loader: &dyn DocumentLoader,
    path: &Path,
    pages_per_student: i64,
    dpi: u32,
) -> AppResult<Vec<RenderedChunk>> {
    let mut rendered = Vec::new();

    loader.with_document(path, &mut |document: &dyn PageSource| {
        let page_count = document.page_count();
        let chunks = PageChunks::new(page_count as i64, pages_per_student)?;
        info!("📄 文档共 {} 页，拆分为 {} 份答卷", page_count, chunks.len());

        for (chunk_index, pages) in chunks.iter().enumerate() {
            let ctx = ChunkCtx::new(chunk_index, pages.clone());
            let mut page_images = Vec::with_capacity(pages.len());
            let mut first_page = None;

            for page_index in pages {
                let image = document.render_page(page_index, dpi)?;
                let png = PageImage::from_image(&image).map_err(|e| {
                    AppError::document_parse(format!("第 {} 页编码 PNG 失败: {}", page_index + 1, e))
                })?;
                page_images.push(png.to_base64());
                first_page.get_or_insert(png);
            }

            // 分组总是非空
            let Some(first_page) = first_page else { continue };
            debug!("{} 渲染完成", ctx);
            rendered.push(RenderedChunk {
                ctx,
                first_page,
                page_images,
            });
        }
        Ok(())
    })?;

    Ok(rendered)
}
