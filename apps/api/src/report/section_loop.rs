//! Section research loop: one owned work item per research section.
//!
//! # States
//! `GenerateQueries → Search → WriteAndGrade → {Done | GenerateQueries}`
//!
//! - The first round asks the writer model for `number_of_queries` queries.
//!   Later rounds reuse the grader's follow-up queries instead.
//! - Every round rewrites the section with all content gathered so far and
//!   grades it. A pass or the iteration ceiling ends the loop, so a section
//!   gets at most `max_search_depth + 1` write/grade attempts.
//! - A failing grade without follow-ups, or a passed report deadline, forces
//!   the loop to stop with the latest draft kept.
//!
//! Generation errors end the work item with a `SectionFailure`; the
//! orchestrator decides what content stands in for it.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ReportSettings;
use crate::llm_client::prompts::SOURCE_DISCIPLINE_INSTRUCTION;
use crate::llm_client::{generate_structured, generate_structured_checked, LlmError, Prompt};
use crate::report::models::{
    CompletedSection, Grade, Queries, Section, SectionTrace, StopReason,
};
use crate::report::prompts::{
    fill, QUERY_WRITER_SYSTEM, QUERY_WRITER_USER, SECTION_GRADER_SYSTEM, SECTION_GRADER_USER,
    SECTION_WRITER_INPUTS, SECTION_WRITER_SYSTEM,
};
use crate::report::{Capabilities, Phase};

// ────────────────────────────────────────────────────────────────────────────
// Work item and states
// ────────────────────────────────────────────────────────────────────────────

/// Mutable state of one section while its loop runs. Owned by a single task.
#[derive(Debug)]
pub struct SectionWorkItem {
    pub section: Section,
    /// Completed retry rounds; 0 during the first write/grade attempt.
    pub search_iterations: u32,
    pub current_queries: Vec<String>,
    pub source_context: String,
    /// Write/grade attempts started so far.
    pub attempts: u32,
}

impl SectionWorkItem {
    pub fn new(section: Section) -> Self {
        Self {
            section,
            search_iterations: 0,
            current_queries: Vec::new(),
            source_context: String::new(),
            attempts: 0,
        }
    }

    fn trace(&self, stop_reason: StopReason) -> SectionTrace {
        SectionTrace {
            name: self.section.name.clone(),
            research: self.section.requires_research,
            iterations: self.attempts,
            stop_reason,
        }
    }

    fn complete(self, stop_reason: StopReason) -> CompletedSection {
        CompletedSection {
            trace: self.trace(stop_reason),
            section: self.section,
        }
    }

    fn fail(self, phase: Phase, source: LlmError) -> SectionFailure {
        SectionFailure {
            iterations: self.attempts,
            section: self.section,
            phase,
            source,
        }
    }
}

#[derive(Debug)]
enum LoopState {
    /// `follow_ups` carries the grader's queries on retry rounds.
    GenerateQueries { follow_ups: Option<Vec<String>> },
    Search,
    WriteAndGrade,
    Done(StopReason),
}

/// What to do after a draft has been graded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Stop(StopReason),
    Retry { follow_ups: Vec<String> },
}

/// Decides the transition after a grade. The ceiling always wins over a
/// retry; a passed deadline is checked last so it only cuts short a loop
/// that would otherwise keep going.
pub fn next_state(
    grade: &Grade,
    search_iterations: u32,
    max_search_depth: u32,
    deadline_passed: bool,
) -> Decision {
    if grade.passed() {
        return Decision::Stop(StopReason::Passed);
    }
    if search_iterations >= max_search_depth {
        return Decision::Stop(StopReason::CeilingReached);
    }
    let follow_ups = grade.follow_ups();
    if follow_ups.is_empty() {
        return Decision::Stop(StopReason::Stalled);
    }
    if deadline_passed {
        return Decision::Stop(StopReason::DeadlineExceeded);
    }
    Decision::Retry { follow_ups }
}

/// A section whose loop hit a generation error. `section.content` holds the
/// last successful draft, if any.
#[derive(Debug)]
pub struct SectionFailure {
    pub section: Section,
    pub phase: Phase,
    pub iterations: u32,
    pub source: LlmError,
}

// ────────────────────────────────────────────────────────────────────────────
// Loop
// ────────────────────────────────────────────────────────────────────────────

/// Runs research sections. Cheap to clone into each spawned task.
#[derive(Clone)]
pub struct SectionLoop {
    caps: Capabilities,
    settings: Arc<ReportSettings>,
    topic: Arc<str>,
    deadline: Option<Instant>,
}

impl SectionLoop {
    pub fn new(
        caps: Capabilities,
        settings: Arc<ReportSettings>,
        topic: Arc<str>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            caps,
            settings,
            topic,
            deadline,
        }
    }

    /// Drives one section from empty to a terminal state.
    pub async fn run(&self, section: Section) -> Result<CompletedSection, SectionFailure> {
        let mut item = SectionWorkItem::new(section);
        let mut state = LoopState::GenerateQueries { follow_ups: None };

        loop {
            state = match state {
                LoopState::GenerateQueries {
                    follow_ups: Some(follow_ups),
                } => {
                    item.current_queries = follow_ups;
                    LoopState::Search
                }

                LoopState::GenerateQueries { follow_ups: None } => {
                    match self.generate_queries(&item.section).await {
                        Ok(queries) => {
                            item.current_queries = queries;
                            LoopState::Search
                        }
                        Err(e) => return Err(item.fail(Phase::QueryGeneration, e)),
                    }
                }

                LoopState::Search => {
                    item.source_context = self
                        .caps
                        .search
                        .search(&item.current_queries, self.max_results())
                        .await;
                    debug!(
                        section = %item.section.name,
                        queries = item.current_queries.len(),
                        context_chars = item.source_context.len(),
                        "Section search complete"
                    );
                    LoopState::WriteAndGrade
                }

                LoopState::WriteAndGrade => {
                    item.attempts += 1;

                    let draft = match self.write(&item).await {
                        Ok(draft) => draft,
                        Err(e) => return Err(item.fail(Phase::Writing, e)),
                    };
                    if !item.section.set_content(draft) {
                        warn!(section = %item.section.name, "Writer returned a blank draft; keeping previous content");
                    }

                    let grade = match self.grade(&item.section).await {
                        Ok(grade) => grade,
                        Err(e) => return Err(item.fail(Phase::Grading, e)),
                    };

                    let decision = next_state(
                        &grade,
                        item.search_iterations,
                        self.settings.max_search_depth,
                        self.deadline_passed(),
                    );
                    info!(
                        section = %item.section.name,
                        iteration = item.search_iterations,
                        grade = ?grade.grade,
                        "Section graded"
                    );

                    match decision {
                        Decision::Stop(reason) => LoopState::Done(reason),
                        Decision::Retry { follow_ups } => {
                            item.search_iterations += 1;
                            LoopState::GenerateQueries {
                                follow_ups: Some(follow_ups),
                            }
                        }
                    }
                }

                LoopState::Done(reason) => {
                    match reason {
                        StopReason::Stalled => warn!(
                            section = %item.section.name,
                            "Grader failed the section without follow-up queries; stopping"
                        ),
                        StopReason::DeadlineExceeded => warn!(
                            section = %item.section.name,
                            "Report deadline passed; keeping the latest draft"
                        ),
                        StopReason::CeilingReached => info!(
                            section = %item.section.name,
                            "Search depth ceiling reached; keeping the latest draft"
                        ),
                        _ => {}
                    }
                    info!(
                        section = %item.section.name,
                        attempts = item.attempts,
                        stop_reason = ?reason,
                        "Section loop done"
                    );
                    return Ok(item.complete(reason));
                }
            };
        }
    }

    /// `max_search_depth` doubles as the per-query result count; at least one.
    fn max_results(&self) -> u32 {
        self.settings.max_search_depth.max(1)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    async fn generate_queries(&self, section: &Section) -> Result<Vec<String>, LlmError> {
        let count = self.settings.number_of_queries;
        let system = fill(
            QUERY_WRITER_SYSTEM,
            &[
                ("topic", &*self.topic),
                ("section_name", section.name.as_str()),
                ("section_topic", section.description.as_str()),
                ("number_of_queries", count.to_string().as_str()),
            ],
        );
        let prompt = Prompt::new(system, QUERY_WRITER_USER);

        let queries: Queries =
            generate_structured_checked(self.caps.writer.as_ref(), &prompt, |q: &Queries| {
                let usable = q
                    .queries
                    .iter()
                    .filter(|q| !q.search_query.trim().is_empty())
                    .count();
                if usable == count {
                    Ok(())
                } else {
                    Err(format!("expected {count} queries, got {usable}"))
                }
            })
            .await?;

        Ok(queries.into_strings())
    }

    async fn write(&self, item: &SectionWorkItem) -> Result<String, LlmError> {
        let section = &item.section;
        let user = fill(
            SECTION_WRITER_INPUTS,
            &[
                ("topic", &*self.topic),
                ("section_name", section.name.as_str()),
                ("section_topic", section.description.as_str()),
                ("section_content", section.content.as_str()),
                ("context", item.source_context.as_str()),
                ("source_discipline", SOURCE_DISCIPLINE_INSTRUCTION),
            ],
        );
        let prompt = Prompt::new(SECTION_WRITER_SYSTEM, user);

        self.caps.writer.generate_text(&prompt).await
    }

    async fn grade(&self, section: &Section) -> Result<Grade, LlmError> {
        let system = fill(
            SECTION_GRADER_SYSTEM,
            &[
                ("topic", &*self.topic),
                ("section_name", section.name.as_str()),
                ("section_topic", section.description.as_str()),
                ("section", section.content.as_str()),
                (
                    "number_of_follow_up_queries",
                    self.settings.number_of_queries.to_string().as_str(),
                ),
            ],
        );
        let prompt = Prompt::new(system, SECTION_GRADER_USER);

        generate_structured(self.caps.planner.as_ref(), &prompt).await
    }
}
