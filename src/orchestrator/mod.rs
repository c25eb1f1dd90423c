//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，不做具体的识别和评分判断。
//!
//! ## 模块划分
//!
//! ### `intake_pipeline` - 批量入库
//! - 上传文件落盘到临时目录，处理结束即删除
//! - 按页数拆分答卷（PageChunks）
//! - 渲染页面、识别学生身份（IdentityResolver）
//!
//! ### `grading_pipeline` - 分部分评分
//! - 按重新评分策略挑选学生
//! - 并发评分（SectionGrader），产出 ScorePatch
//! - 在一次存储更新中合并结果
//!
//! ## 层次关系
//!
//! ```text
//! api (HTTP handlers)
//!     ↓
//! orchestrator (intake_pipeline / grading_pipeline)
//!     ↓
//! workflow (ChunkCtx / StudentCtx)
//!     ↓
//! services (identity_resolver / section_grader / session_store / csv_export)
//!     ↓
//! infrastructure (DocumentLoader / PageImage / TempUpload)
//! ```
//!
//! ## 设计原则
//!
//! 1. **顺序稳定**：并发只影响速度，输出顺序始终与输入一致
//! 2. **失败隔离**：单项失败转换为数据，批处理不会因此中断
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure

pub mod grading_pipeline;
pub mod intake_pipeline;

// 重新导出主要类型
pub use grading_pipeline::{GradingPipeline, GradingSummary};
pub use intake_pipeline::IntakePipeline;
