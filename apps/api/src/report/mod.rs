// Report generation engine.
// Flow: validate JD → plan → research sections (parallel section loops) →
//       collect → direct sections (parallel) → compile.
// All LLM calls go through the StructuredGenerator capability; all searches
// through SearchClient. Nothing here talks to a provider directly.

pub mod assemble;
pub mod handlers;
pub mod jd_validation;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod section_loop;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::llm_client::{LlmError, StructuredGenerator};
use crate::search::SearchClient;

/// Capability handles built once at startup and shared by every task.
///
/// `planner` handles planning, grading and JD validation; `writer` handles
/// per-section query generation and all section writing.
#[derive(Clone)]
pub struct Capabilities {
    pub planner: Arc<dyn StructuredGenerator>,
    pub writer: Arc<dyn StructuredGenerator>,
    pub search: SearchClient,
}

/// Step of the pipeline an LLM failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validation,
    PlanningQueries,
    Planning,
    QueryGeneration,
    Writing,
    Grading,
    DirectWriting,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Validation => "job description validation",
            Phase::PlanningQueries => "planning query generation",
            Phase::Planning => "section planning",
            Phase::QueryGeneration => "query generation",
            Phase::Writing => "section writing",
            Phase::Grading => "section grading",
            Phase::DirectWriting => "direct section writing",
        };
        f.write_str(label)
    }
}

/// Report-level failures. A caller gets either a full report or one of these.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Job description is empty")]
    EmptyTopic,

    #[error("Input does not look like a job description")]
    InvalidJobDescription,

    #[error("{phase} failed: {source}")]
    Generation {
        phase: Phase,
        #[source]
        source: LlmError,
    },

    #[error("Planner produced no sections")]
    EmptyPlan,

    #[error("Section '{0}' was planned but never completed")]
    MissingSection(String),

    #[error("Section '{0}' completed without content")]
    EmptySection(String),
}

impl ReportError {
    pub fn generation(phase: Phase) -> impl FnOnce(LlmError) -> ReportError {
        move |source| ReportError::Generation { phase, source }
    }
}
