mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{roster_csv, student_with_page, test_config, FakeExamModel, FakeLoader};
use exam_grader::models::{ExamSession, RegradePolicy};
use exam_grader::{build_router, AppState, Config, InMemorySessionStore, SessionStore};

const BOUNDARY: &str = "exam-grader-boundary";
const STRUCTURE: &str = "Part 1: Kinematics\nPart 2: Optics";

fn graded_model() -> Arc<FakeExamModel> {
    Arc::new(
        FakeExamModel::new()
            .identity(1, "6401", "Ann Lee")
            .identity(3, "6402", "Bo Chen")
            .grade(1, r#"{"score": 9, "total_score": 10, "feedback": "clear"}"#)
            .grade(3, r#"{"score": 4.5, "total_score": 10, "feedback": "partial"}"#),
    )
}

fn app(config: Config, store: Arc<dyn SessionStore>, pages: usize) -> Router {
    build_router(AppState::new(config, store, graded_model(), FakeLoader::with_pages(pages)))
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn create_request(pages_per_student: &str) -> Request<Body> {
    let body = multipart_body(
        &[
            ("session_name", "Physics Final"),
            ("subject", "Physics"),
            ("exam_structure", STRUCTURE),
            ("pages_per_student", pages_per_student),
        ],
        &[
            ("roster_file", "roster.csv", roster_csv()),
            ("batch_file", "batch.pdf", b"%PDF-1.7"),
        ],
    );
    Request::builder()
        .method("POST")
        .uri("/api/sessions")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, value: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_check_responds() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(dir.path()), Arc::new(InMemorySessionStore::new()), 2);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["status"], "ok");
}

#[tokio::test]
async fn unknown_session_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(test_config(dir.path()), Arc::new(InMemorySessionStore::new()), 2);

    let response = app.oneshot(get("/api/sessions/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(read_json(response).await["error"].as_str().unwrap().contains("missing"));
}

#[tokio::test]
async fn invalid_pages_per_student_is_bad_request() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemorySessionStore::new());
    let app = app(test_config(dir.path()), store.clone(), 4);

    let response = app.clone().oneshot(create_request("0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(create_request("two")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(store.is_empty());
}

#[tokio::test]
async fn full_grading_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(InMemorySessionStore::new());
    let app = app(test_config(dir.path()), store.clone(), 4);

    // 建会话：4 页，每份 2 页
    let response = app.clone().oneshot(create_request("2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json(response).await;
    let session_id = created["session_id"].as_str().unwrap().to_string();
    assert_eq!(created["sections"], json!(["Part 1", "Part 2"]));
    assert_eq!(created["students"][0]["id"], "6401");
    assert_eq!(created["students"][1]["id"], "6402");
    assert_eq!(created["students"][0]["page_count"], 2);

    // 评分 Part 1
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{session_id}/grade"),
            json!({ "section": "Part 1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let graded = read_json(response).await;
    assert_eq!(graded["graded"], 2);
    assert_eq!(graded["failed"], 0);
    assert_eq!(graded["rows"][1]["result"]["score"], 4.5);

    // 人工确认第二名学生的分数
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{session_id}/scores"),
            json!({ "section": "Part 1", "scores": { "6402": 6 } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["updated"], 1);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/sessions/{session_id}/sections/Part%201")))
        .await
        .unwrap();
    let section = read_json(response).await;
    assert_eq!(section["rows"][1]["result"]["score"], 6.0);
    assert_eq!(section["rows"][1]["result"]["verified"], true);

    // 学生详情包含答卷图片
    let response = app
        .clone()
        .oneshot(get(&format!("/api/sessions/{session_id}/students/6401")))
        .await
        .unwrap();
    let student = read_json(response).await;
    assert_eq!(student["page_images"].as_array().unwrap().len(), 2);

    // 导出
    let response = app
        .oneshot(get(&format!("/api/sessions/{session_id}/export")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Results_Physics Final.csv\""
    );
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines[1], "6401,Ann Lee,9,0,9");
    assert_eq!(lines[2], "6402,Bo Chen,6,0,6");
    assert!(dir.path().join("exports/Results_Physics Final.csv").exists());
}

#[tokio::test]
async fn reject_policy_returns_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        regrade_policy: RegradePolicy::Reject,
        ..test_config(dir.path())
    };
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let students = vec![student_with_page("6401", "Ann Lee", 1)];
    let mut session = ExamSession::new("", "Quiz", "Physics", STRUCTURE, students);
    session.students[0]
        .scores
        .insert("Part 1".to_string(), exam_grader::SectionResult::graded(5.0, 10.0, "ok"));
    session.students[0].verify_score("Part 1", 7.0);
    let session_id = store.create(session);
    let app = app(config, store, 2);

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{session_id}/grade"),
            json!({ "section": "Part 1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_student_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let session_id = store.create(ExamSession::new("", "Quiz", "Physics", STRUCTURE, vec![]));
    let app = app(test_config(dir.path()), store, 2);

    let response = app
        .oneshot(get(&format!("/api/sessions/{session_id}/students/nobody")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn grade_route_scores_seeded_session() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let students = vec![
        student_with_page("6401", "Ann Lee", 1),
        student_with_page("6402", "Bo Chen", 3),
    ];
    let session_id = store.create(ExamSession::new("", "Quiz", "Physics", STRUCTURE, students));
    let app = app(test_config(dir.path()), store.clone(), 2);

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/api/sessions/{session_id}/grade"),
            json!({ "section": "Part 1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let graded = read_json(response).await;
    assert_eq!(graded["graded"], 2);
    assert_eq!(graded["failed"], 0);
    assert_eq!(graded["rows"][0]["result"]["score"], 9.0);

    let session = store.get(&session_id).unwrap();
    assert_eq!(session.students[1].scores["Part 1"].score, 4.5);
}
