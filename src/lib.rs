//! # Exam Grader
//!
//! 一个借助视觉大模型批量批改扫描试卷的 Rust 服务
//!
//! ## 架构设计
//!
//! 本系统沿用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（pdfium、临时文件），只暴露能力
//! - `DocumentLoader` - 打开文档并按页渲染
//! - `PageImage` - PNG 页面图片及其 base64 形式
//! - `TempUpload` - 作用域内有效的上传临时文件
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个分组或单个学生
//! - `PageChunks` - 按每份页数拆分文档
//! - `IdentityResolver` - 识别学号和姓名
//! - `SectionGrader` - 按部分评分
//! - `SessionStore` - 会话存储
//! - `csv_export` - 成绩导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 日志上下文（`ChunkCtx` / `StudentCtx`）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/intake_pipeline` - 批量入库：拆分、渲染、识别
//! - `orchestrator/grading_pipeline` - 分部分评分与结果合并
//!
//! ### ⑤ 接口层（API）
//! - `api/` - axum HTTP 接口
//!
//! ## 模块结构

pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use api::{build_router, start_server, AppState};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{DocumentLoader, PdfiumLoader};
pub use models::{ExamSession, Roster, SectionResult, StudentRecord};
pub use orchestrator::{GradingPipeline, IntakePipeline};
pub use services::{InMemorySessionStore, LlmService, SessionStore, VisionModel};
pub use workflow::{ChunkCtx, StudentCtx};
