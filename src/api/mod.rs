//! API 模块
//!
//! 对外提供 JSON HTTP 接口：上传建会话、分部分评分、人工确认和 CSV 导出

mod error;
pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::infrastructure::DocumentLoader;
use crate::orchestrator::{GradingPipeline, IntakePipeline};
use crate::services::{SessionStore, VisionModel};

pub use handlers::*;
pub use types::*;

/// 各处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn SessionStore>,
    pub intake: Arc<IntakePipeline>,
    pub grading: Arc<GradingPipeline>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn SessionStore>,
        model: Arc<dyn VisionModel>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Self {
        Self {
            intake: Arc::new(IntakePipeline::new(loader, Arc::clone(&model), &config)),
            grading: Arc::new(GradingPipeline::new(model, &config)),
            store,
            config: Arc::new(config),
        }
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_mb.saturating_mul(1024 * 1024);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/{session_id}", get(get_session))
        .route("/api/sessions/{session_id}/grade", post(grade_section))
        .route("/api/sessions/{session_id}/sections/{section}", get(get_section))
        .route("/api/sessions/{session_id}/students/{student_id}", get(get_student))
        .route("/api/sessions/{session_id}/scores", post(save_scores))
        .route("/api/sessions/{session_id}/export", get(export_csv))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动 HTTP 服务
pub async fn start_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    tracing::info!("🌐 HTTP 服务监听 {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
