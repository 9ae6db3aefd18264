//! Axum route handlers for the Report API.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::report::models::SectionTrace;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report_id: Uuid,
    pub report: String,
    pub sections: Vec<SectionTrace>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/reports
///
/// Full pipeline: validate JD → plan → research sections → direct sections → compile.
/// Responds only once the whole report is assembled.
pub async fn handle_generate_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let generated = state.orchestrator.generate(&request.job_description).await?;
    info!(
        report_id = %generated.report_id,
        sections = generated.sections.len(),
        "Report generated"
    );

    Ok(Json(ReportResponse {
        report_id: generated.report_id,
        report: generated.report,
        sections: generated.sections,
        generated_at: generated.generated_at,
    }))
}

/// POST /api/v1/reports/validate
///
/// Checks whether the input looks like a job description without generating anything.
pub async fn handle_validate_job_description(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ValidateResponse>, AppError> {
    if request.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description cannot be empty".to_string(),
        ));
    }

    let valid = state.orchestrator.validate(&request.job_description).await?;

    Ok(Json(ValidateResponse { valid }))
}
