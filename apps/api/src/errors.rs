use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::report::ReportError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::EmptyTopic | ReportError::InvalidJobDescription => {
                AppError::Validation(err.to_string())
            }
            ReportError::Generation { .. } | ReportError::EmptyPlan => {
                AppError::Llm(err.to_string())
            }
            ReportError::MissingSection(_) | ReportError::EmptySection(_) => {
                AppError::Internal(anyhow::Error::new(err))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Llm(msg) => {
                tracing::error!("LLM error: {msg}");
                (
                    StatusCode::BAD_GATEWAY,
                    "LLM_ERROR",
                    "An AI processing error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use crate::report::Phase;

    #[test]
    fn test_report_errors_map_to_http_classes() {
        assert!(matches!(
            AppError::from(ReportError::InvalidJobDescription),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(ReportError::generation(Phase::Planning)(LlmError::EmptyContent)),
            AppError::Llm(msg) if msg.contains("section planning")
        ));
        assert!(matches!(
            AppError::from(ReportError::MissingSection("SQL".to_string())),
            AppError::Internal(_)
        ));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("x".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Llm("x".to_string()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
