//! 错误到 HTTP 响应的映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::AppError;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::Roster(_) => StatusCode::BAD_REQUEST,
            AppError::DocumentParse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SessionNotFound(_) | AppError::StudentNotFound(_) => StatusCode::NOT_FOUND,
            AppError::RegradeBlocked { .. } => StatusCode::CONFLICT,
            AppError::Export { .. }
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("❌ 请求失败: {}", self);
        } else {
            warn!("请求被拒绝 ({}): {}", status.as_u16(), self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::invalid_input("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Roster("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::document_parse("x").status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::SessionNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::RegradeBlocked {
                section: "Part 1".into(),
                verified: 1
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Other("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let response = AppError::SessionNotFound("abc".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(value["error"].as_str().unwrap().contains("abc"));
    }
}
