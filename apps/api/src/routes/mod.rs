pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::report::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/reports", post(handlers::handle_generate_report))
        .route(
            "/api/v1/reports/validate",
            post(handlers::handle_validate_job_description),
        )
        .with_state(state)
}
