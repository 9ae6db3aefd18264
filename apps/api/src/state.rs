use std::sync::Arc;

use crate::report::orchestrator::ReportOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the capability handles; one instance serves every request.
    pub orchestrator: Arc<ReportOrchestrator>,
}
