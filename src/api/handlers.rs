//! HTTP 处理函数
//!
//! 处理函数只负责解析请求和组装响应，具体流程委托给编排层。

use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::info;

use crate::api::types::{
    GradeRequest, GradeResponse, HealthResponse, SaveScoresRequest, SaveScoresResponse, SectionView,
    SessionSummary,
};
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{ExamSession, Roster, StudentRecord};
use crate::services::csv_export;

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 新建会话表单
#[derive(Default)]
struct SessionForm {
    session_name: Option<String>,
    subject: Option<String>,
    exam_structure: Option<String>,
    pages_per_student: Option<String>,
    roster_file: Option<Vec<u8>>,
    batch_file: Option<Vec<u8>>,
}

impl SessionForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let bad_form = |e: axum::extract::multipart::MultipartError| {
            AppError::invalid_input(format!("表单读取失败: {}", e))
        };

        let mut form = SessionForm::default();
        while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "session_name" => form.session_name = Some(field.text().await.map_err(bad_form)?),
                "subject" => form.subject = Some(field.text().await.map_err(bad_form)?),
                "exam_structure" => {
                    form.exam_structure = Some(field.text().await.map_err(bad_form)?)
                }
                "pages_per_student" => {
                    form.pages_per_student = Some(field.text().await.map_err(bad_form)?)
                }
                "roster_file" => {
                    form.roster_file = Some(field.bytes().await.map_err(bad_form)?.to_vec())
                }
                "batch_file" => {
                    form.batch_file = Some(field.bytes().await.map_err(bad_form)?.to_vec())
                }
                other => tracing::debug!("忽略未知表单字段: {}", other),
            }
        }
        Ok(form)
    }
}

fn required<T>(value: Option<T>, field: &str) -> AppResult<T> {
    value.ok_or_else(|| AppError::invalid_input(format!("缺少字段 {}", field)))
}

/// 上传合订试卷和花名册，创建会话
pub async fn create_session(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    let form = SessionForm::read(multipart).await?;

    let session_name = required(form.session_name, "session_name")?;
    let subject = required(form.subject, "subject")?;
    let exam_structure = required(form.exam_structure, "exam_structure")?;
    let pages_text = required(form.pages_per_student, "pages_per_student")?;
    let pages_per_student: i64 = pages_text
        .trim()
        .parse()
        .map_err(|_| AppError::invalid_input(format!("pages_per_student 不是整数: {}", pages_text)))?;
    let roster_bytes = required(form.roster_file, "roster_file")?;
    let batch = required(form.batch_file, "batch_file")?;

    let roster = Roster::from_csv_bytes(&roster_bytes)?;
    info!(
        "📥 新会话 '{}'：{} 字节，每份 {} 页，花名册 {} 人",
        session_name,
        batch.len(),
        pages_per_student,
        roster.len()
    );

    let students = state.intake.run(batch, pages_per_student, &roster).await?;
    let session = ExamSession::new("", session_name, subject, exam_structure, students);
    let session_id = state.store.create(session);
    let session = load_session(&state, &session_id)?;

    Ok((StatusCode::CREATED, Json(SessionSummary::from(&session))))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<Json<SessionSummary>> {
    let session = load_session(&state, &session_id)?;
    Ok(Json(SessionSummary::from(&session)))
}

/// 对某一部分评分，返回复核列表
pub async fn grade_section(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<GradeRequest>,
) -> AppResult<Json<GradeResponse>> {
    let summary = state
        .grading
        .grade_stored_session(state.store.as_ref(), &session_id, &request.section)
        .await?;
    let session = load_session(&state, &session_id)?;
    Ok(Json(GradeResponse::new(
        summary,
        SectionView::new(&session, request.section.trim()),
    )))
}

pub async fn get_section(
    State(state): State<AppState>,
    Path((session_id, section)): Path<(String, String)>,
) -> AppResult<Json<SectionView>> {
    let session = load_session(&state, &session_id)?;
    Ok(Json(SectionView::new(&session, &section)))
}

/// 单个学生的完整记录（含答卷图片）
pub async fn get_student(
    State(state): State<AppState>,
    Path((session_id, student_id)): Path<(String, String)>,
) -> AppResult<Json<StudentRecord>> {
    let session = load_session(&state, &session_id)?;
    session
        .find_student(&student_id)
        .cloned()
        .map(Json)
        .ok_or(AppError::StudentNotFound(student_id))
}

/// 保存人工确认的分数
pub async fn save_scores(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SaveScoresRequest>,
) -> AppResult<Json<SaveScoresResponse>> {
    let section = request.section.trim();
    if section.is_empty() {
        return Err(AppError::invalid_input("section 不能为空"));
    }

    let mut updated = 0;
    state.store.update(&session_id, &mut |session: &mut ExamSession| {
        updated = session.apply_verification(section, &request.scores);
    })?;
    info!("会话 {} 部分 '{}' 确认了 {} 条成绩", session_id, section, updated);

    Ok(Json(SaveScoresResponse {
        section: section.to_string(),
        updated,
    }))
}

/// 导出 CSV：写入导出目录，同时作为附件返回
pub async fn export_csv(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let session = load_session(&state, &session_id)?;
    let export_dir = FsPath::new(&state.config.export_dir);
    let (path, content) = csv_export::write_export(&session, export_dir)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| csv_export::export_file_name(&session.session_name));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        content,
    ))
}

fn load_session(state: &AppState, session_id: &str) -> AppResult<ExamSession> {
    state
        .store
        .get(session_id)
        .ok_or_else(|| AppError::SessionNotFound(session_id.to_string()))
}
