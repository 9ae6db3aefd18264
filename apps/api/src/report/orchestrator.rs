//! Report orchestration.
//!
//! `PLANNING → FAN_OUT_RESEARCH → BARRIER → COLLECT → FAN_OUT_DIRECT → BARRIER → COMPILE`
//!
//! Each research section runs its own `SectionLoop` in a spawned task; each
//! non-research section gets one spawned direct-write task. Both barriers
//! join every handle, so no section is ever dropped: a section whose task
//! fails is replaced by placeholder content noting the failure.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ReportSettings;
use crate::llm_client::prompts::SOURCE_DISCIPLINE_INSTRUCTION;
use crate::llm_client::{generate_structured, generate_structured_checked, LlmError, Prompt};
use crate::report::assemble::{collect, compile, traces};
use crate::report::jd_validation::validate_job_description;
use crate::report::models::{
    CompletedSection, CompletedSections, GeneratedReport, Queries, ReportPlan, Section,
    SectionTrace, Sections, StopReason,
};
use crate::report::prompts::{
    fill, FINAL_SECTION_WRITER_SYSTEM, FINAL_SECTION_WRITER_USER, PLANNER_QUERY_SYSTEM,
    PLANNER_QUERY_USER, PLANNER_SYSTEM, PLANNER_USER,
};
use crate::report::section_loop::{SectionFailure, SectionLoop};
use crate::report::{Capabilities, Phase, ReportError};

pub struct ReportOrchestrator {
    caps: Capabilities,
    settings: Arc<ReportSettings>,
}

impl ReportOrchestrator {
    pub fn new(caps: Capabilities, settings: ReportSettings) -> Self {
        Self {
            caps,
            settings: Arc::new(settings),
        }
    }

    /// Runs the whole pipeline for one job description.
    pub async fn generate(&self, topic: &str) -> Result<GeneratedReport, ReportError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ReportError::EmptyTopic);
        }
        let deadline = self
            .settings
            .report_deadline
            .map(|budget| Instant::now() + budget);

        if self.settings.validate_job_description && !self.validate(topic).await? {
            return Err(ReportError::InvalidJobDescription);
        }

        let plan = self.plan(topic).await?;
        let topic: Arc<str> = Arc::from(topic);

        let mut completed = CompletedSections::new();
        for done in self.fan_out_research(&plan, topic.clone(), deadline).await {
            completed.insert(done);
        }
        info!(
            "Research phase complete: {}/{} sections",
            completed.len(),
            plan.research_sections().count()
        );

        let research_context: Arc<str> = Arc::from(collect(&plan, &completed));
        for done in self.fan_out_direct(&plan, topic, research_context).await {
            completed.insert(done);
        }

        let report = compile(&plan, &completed)?;
        info!(
            sections = plan.len(),
            chars = report.len(),
            "Report compiled"
        );

        Ok(GeneratedReport {
            report_id: Uuid::new_v4(),
            sections: traces(&plan, &completed),
            report,
            generated_at: Utc::now(),
        })
    }

    /// Whether `topic` looks like a job description. Blank input is rejected
    /// without calling the model.
    pub async fn validate(&self, topic: &str) -> Result<bool, ReportError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ReportError::EmptyTopic);
        }
        validate_job_description(self.caps.planner.as_ref(), topic)
            .await
            .map_err(ReportError::generation(Phase::Validation))
    }

    /// Planning queries → one search → section list.
    pub async fn plan(&self, topic: &str) -> Result<ReportPlan, ReportError> {
        let settings = &self.settings;
        let count = settings.number_of_queries;

        let system = fill(
            PLANNER_QUERY_SYSTEM,
            &[
                ("topic", topic),
                ("report_organization", settings.report_structure.as_str()),
                ("number_of_queries", count.to_string().as_str()),
            ],
        );
        let prompt = Prompt::new(system, PLANNER_QUERY_USER);
        let queries: Queries =
            generate_structured_checked(self.caps.planner.as_ref(), &prompt, |q: &Queries| {
                exact_query_count(q, count)
            })
            .await
            .map_err(ReportError::generation(Phase::PlanningQueries))?;

        let queries = queries.into_strings();
        info!("Planning with {} search queries", queries.len());
        let context = self
            .caps
            .search
            .search(&queries, settings.planning_results_per_query)
            .await;
        if context.is_empty() {
            warn!("Planning search returned no context; planning from the job description alone");
        }

        let system = fill(
            PLANNER_SYSTEM,
            &[
                ("topic", topic),
                ("report_organization", settings.report_structure.as_str()),
                ("context", context.as_str()),
            ],
        );
        let user = fill(
            PLANNER_USER,
            &[(
                "min_body_sections",
                settings.min_body_sections.to_string().as_str(),
            )],
        );
        let sections: Sections =
            generate_structured(self.caps.planner.as_ref(), &Prompt::new(system, user))
                .await
                .map_err(ReportError::generation(Phase::Planning))?;

        let plan = ReportPlan::new(sections.sections);
        if plan.is_empty() {
            return Err(ReportError::EmptyPlan);
        }

        let research = plan.research_sections().count();
        let direct = plan.len() - research;
        info!(research, direct, "Report planned with {} sections", plan.len());
        if research < settings.min_body_sections {
            warn!(
                research,
                minimum = settings.min_body_sections,
                "Planner produced fewer body sections than requested"
            );
        }
        if research == 0 || direct == 0 {
            warn!(research, direct, "Plan has no sections of one kind");
        }

        Ok(plan)
    }

    /// Spawns one section loop per research section and waits for all of them.
    /// Results come back in plan order.
    pub async fn fan_out_research(
        &self,
        plan: &ReportPlan,
        topic: Arc<str>,
        deadline: Option<Instant>,
    ) -> Vec<CompletedSection> {
        let runner = SectionLoop::new(self.caps.clone(), self.settings.clone(), topic, deadline);

        let (sections, handles): (Vec<Section>, Vec<_>) = plan
            .research_sections()
            .map(|section| {
                let runner = runner.clone();
                let owned = section.clone();
                (section.clone(), tokio::spawn(async move { runner.run(owned).await }))
            })
            .unzip();
        info!("Spawned {} section loops", handles.len());

        sections
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(section, joined)| match joined {
                Ok(Ok(done)) => done,
                Ok(Err(failure)) => from_failure(failure),
                Err(e) => from_panic(section, e),
            })
            .collect()
    }

    /// Spawns one direct writer per non-research section and waits for all of them.
    pub async fn fan_out_direct(
        &self,
        plan: &ReportPlan,
        topic: Arc<str>,
        research_context: Arc<str>,
    ) -> Vec<CompletedSection> {
        let (sections, handles): (Vec<Section>, Vec<_>) = plan
            .direct_sections()
            .map(|section| {
                let caps = self.caps.clone();
                let topic = topic.clone();
                let context = research_context.clone();
                let owned = section.clone();
                let handle = tokio::spawn(async move {
                    write_direct(&caps, &topic, owned, &context).await
                });
                (section.clone(), handle)
            })
            .unzip();
        info!("Spawned {} direct writers", handles.len());

        sections
            .into_iter()
            .zip(join_all(handles).await)
            .map(|(section, joined)| match joined {
                Ok(Ok(done)) => done,
                Ok(Err(failure)) => from_failure(failure),
                Err(e) => from_panic(section, e),
            })
            .collect()
    }
}

/// One writer call for a non-research section. No grading, no retry.
pub async fn write_direct(
    caps: &Capabilities,
    topic: &str,
    mut section: Section,
    research_context: &str,
) -> Result<CompletedSection, SectionFailure> {
    let system = fill(
        FINAL_SECTION_WRITER_SYSTEM,
        &[
            ("topic", topic),
            ("section_name", section.name.as_str()),
            ("section_topic", section.description.as_str()),
            ("context", research_context),
        ],
    );
    let user = format!("{FINAL_SECTION_WRITER_USER}\n\n{SOURCE_DISCIPLINE_INSTRUCTION}");

    let written = match caps.writer.generate_text(&Prompt::new(system, user)).await {
        Ok(draft) => section.set_content(draft),
        Err(e) => return Err(direct_failure(section, e)),
    };
    if !written {
        return Err(direct_failure(section, LlmError::EmptyContent));
    }

    info!(section = %section.name, "Direct section written");
    Ok(CompletedSection {
        trace: SectionTrace {
            name: section.name.clone(),
            research: section.requires_research,
            iterations: 1,
            stop_reason: StopReason::WrittenDirectly,
        },
        section,
    })
}

fn direct_failure(section: Section, source: LlmError) -> SectionFailure {
    SectionFailure {
        section,
        phase: Phase::DirectWriting,
        iterations: 1,
        source,
    }
}

fn exact_query_count(queries: &Queries, count: usize) -> Result<(), String> {
    let usable = queries
        .queries
        .iter()
        .filter(|q| !q.search_query.trim().is_empty())
        .count();
    if usable == count {
        Ok(())
    } else {
        Err(format!("expected {count} queries, got {usable}"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Failure substitution
// ────────────────────────────────────────────────────────────────────────────

fn placeholder(section: &Section, reason: &str) -> String {
    format!(
        "## {}\n\n> This section could not be generated ({reason}).",
        section.name
    )
}

/// Keeps the partial draft when there is one, otherwise a placeholder.
fn from_failure(failure: SectionFailure) -> CompletedSection {
    let SectionFailure {
        mut section,
        phase,
        iterations,
        source,
    } = failure;
    error!(
        section = %section.name,
        phase = %phase,
        "Section failed: {source}"
    );
    if !section.is_written() {
        section.content = placeholder(&section, &phase.to_string());
    }
    CompletedSection {
        trace: SectionTrace {
            name: section.name.clone(),
            research: section.requires_research,
            iterations,
            stop_reason: StopReason::Failed,
        },
        section,
    }
}

fn from_panic(mut section: Section, err: JoinError) -> CompletedSection {
    error!(section = %section.name, "Section task aborted: {err}");
    section.content = placeholder(&section, "task aborted");
    CompletedSection {
        trace: SectionTrace {
            name: section.name.clone(),
            research: section.requires_research,
            iterations: 0,
            stop_reason: StopReason::Failed,
        },
        section,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::search::SearchClient;
    use crate::test_support::{GradeStep, MockGenerator, MockWebSearch};

    fn data_scientist_plan() -> Vec<Section> {
        vec![
            Section::new("Introduction", "Top skills table", false),
            Section::new("Python", "pandas and NumPy", true),
            Section::new("SQL", "joins and window functions", true),
            Section::new("Conclusion", "Summary", false),
        ]
    }

    fn orchestrator_with(
        generator: MockGenerator,
        settings: ReportSettings,
    ) -> (Arc<MockGenerator>, Arc<MockWebSearch>, ReportOrchestrator) {
        let generator = Arc::new(generator);
        let web = Arc::new(MockWebSearch::new());
        let caps = Capabilities {
            planner: generator.clone(),
            writer: generator.clone(),
            search: SearchClient::new(web.clone(), 200),
        };
        (generator, web, ReportOrchestrator::new(caps, settings))
    }

    fn orchestrator(
        generator: MockGenerator,
    ) -> (Arc<MockGenerator>, Arc<MockWebSearch>, ReportOrchestrator) {
        orchestrator_with(generator, ReportSettings::default())
    }

    #[tokio::test]
    async fn test_data_scientist_report_in_plan_order() {
        let generator = MockGenerator::new().with_sections(data_scientist_plan());
        let (generator, _web, orchestrator) = orchestrator(generator);

        let generated = orchestrator.generate("Data Scientist job").await.unwrap();

        assert_eq!(
            generated.report,
            "## Introduction\n\nIntroduction draft 1.\n\n\
             ## Python\n\nPython draft 1.\n\n\
             ## SQL\n\nSQL draft 1.\n\n\
             ## Conclusion\n\nConclusion draft 1."
        );
        for header in ["## Introduction", "## Python", "## SQL", "## Conclusion"] {
            assert_eq!(generated.report.matches(header).count(), 1, "{header}");
        }
        assert_eq!(generator.writes_for("Python"), 1);
        assert_eq!(generator.writes_for("SQL"), 1);

        let stops: Vec<_> = generated
            .sections
            .iter()
            .map(|t| (t.name.as_str(), t.stop_reason))
            .collect();
        assert_eq!(
            stops,
            vec![
                ("Introduction", StopReason::WrittenDirectly),
                ("Python", StopReason::Passed),
                ("SQL", StopReason::Passed),
                ("Conclusion", StopReason::WrittenDirectly),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order_does_not_change_report_order() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .with_write_delay("Python", Duration::from_secs(5))
            .with_write_delay("Introduction", Duration::from_secs(3))
            .with_grades("SQL", vec![GradeStep::Fail(vec!["sql ctes"]), GradeStep::Pass]);
        let (_generator, _web, orchestrator) = orchestrator(generator);

        let generated = orchestrator.generate("Data Scientist job").await.unwrap();

        let positions: Vec<_> = ["## Introduction", "## Python", "## SQL", "## Conclusion"]
            .iter()
            .map(|h| generated.report.find(h).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(generated.report.contains("SQL draft 2."));
    }

    #[tokio::test]
    async fn test_direct_sections_see_finished_research() {
        let generator = MockGenerator::new().with_sections(data_scientist_plan());
        let (generator, _web, orchestrator) = orchestrator(generator);

        orchestrator.generate("Data Scientist job").await.unwrap();

        let prompts = generator.text_prompts_for("Conclusion");
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].system.contains("Section 1: Python"));
        assert!(prompts[0].system.contains("Python draft 1."));
        assert!(prompts[0].system.contains("Section 2: SQL"));
        assert!(!prompts[0].system.contains("Introduction draft"));
    }

    #[tokio::test]
    async fn test_failed_section_gets_placeholder() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .failing_queries_for("SQL");
        let (_generator, _web, orchestrator) = orchestrator(generator);

        let generated = orchestrator.generate("Data Scientist job").await.unwrap();

        assert!(generated
            .report
            .contains("## SQL\n\n> This section could not be generated (query generation)."));
        assert!(generated.report.contains("Python draft 1."));
        let sql = generated.sections.iter().find(|t| t.name == "SQL").unwrap();
        assert_eq!(sql.stop_reason, StopReason::Failed);
        assert_eq!(sql.iterations, 0);
    }

    #[tokio::test]
    async fn test_failed_grade_keeps_partial_draft() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .failing_grades_for("Python");
        let (_generator, _web, orchestrator) = orchestrator(generator);

        let generated = orchestrator.generate("Data Scientist job").await.unwrap();

        assert!(generated.report.contains("## Python\n\nPython draft 1."));
        assert!(!generated.report.contains("could not be generated"));
    }

    #[tokio::test]
    async fn test_invalid_job_description_stops_before_planning() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .rejecting_job_description();
        let (generator, web, orchestrator) = orchestrator(generator);

        let err = orchestrator.generate("hello there").await.unwrap_err();

        assert!(matches!(err, ReportError::InvalidJobDescription));
        assert_eq!(generator.planning_query_calls(), 0);
        assert!(web.calls().is_empty());
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .rejecting_job_description();
        let settings = ReportSettings {
            validate_job_description: false,
            ..ReportSettings::default()
        };
        let (_generator, _web, orchestrator) = orchestrator_with(generator, settings);

        assert!(orchestrator.generate("Data Scientist job").await.is_ok());
    }

    #[tokio::test]
    async fn test_blank_topic_rejected() {
        let (generator, _web, orchestrator) = orchestrator(MockGenerator::new());
        assert!(matches!(
            orchestrator.generate("   ").await,
            Err(ReportError::EmptyTopic)
        ));
        assert_eq!(generator.planning_query_calls(), 0);
    }

    #[tokio::test]
    async fn test_planning_failure_is_fatal() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .failing_planning();
        let (generator, _web, orchestrator) = orchestrator(generator);

        let err = orchestrator.generate("Data Scientist job").await.unwrap_err();

        assert!(matches!(
            err,
            ReportError::Generation {
                phase: Phase::PlanningQueries,
                ..
            }
        ));
        assert_eq!(generator.writes_for("Python"), 0);
    }

    #[tokio::test]
    async fn test_empty_section_list_fails_planning() {
        let (_generator, _web, orchestrator) = orchestrator(MockGenerator::new());

        let err = orchestrator.plan("Data Scientist job").await.unwrap_err();

        assert!(matches!(
            err,
            ReportError::Generation {
                phase: Phase::Planning,
                source: LlmError::Schema { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_planning_search_uses_planning_result_count() {
        let generator = MockGenerator::new().with_sections(data_scientist_plan());
        let settings = ReportSettings {
            number_of_queries: 3,
            planning_results_per_query: 5,
            ..ReportSettings::default()
        };
        let (generator, web, orchestrator) = orchestrator_with(generator, settings);

        let plan = orchestrator.plan("Data Scientist job").await.unwrap();

        assert_eq!(plan.len(), 4);
        assert_eq!(generator.planning_query_calls(), 1);
        let mut calls = web.calls();
        calls.sort();
        assert_eq!(
            calls,
            vec![
                ("planning query 1".to_string(), 5),
                ("planning query 2".to_string(), 5),
                ("planning query 3".to_string(), 5),
            ]
        );
    }

    fn three_body_plan() -> Vec<Section> {
        vec![
            Section::new("Introduction", "Top skills table", false),
            Section::new("Python", "pandas and NumPy", true),
            Section::new("SQL", "joins and window functions", true),
            Section::new("Statistics", "hypothesis testing", true),
            Section::new("Roadmap", "Learning path", false),
            Section::new("Conclusion", "Summary", false),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_research_sections_run_concurrently() {
        let generator = MockGenerator::new()
            .with_sections(three_body_plan())
            .with_write_delay("Python", Duration::from_secs(10))
            .with_write_delay("SQL", Duration::from_secs(10))
            .with_write_delay("Statistics", Duration::from_secs(10));
        let (generator, _web, orchestrator) = orchestrator(generator);

        let started = Instant::now();
        orchestrator.generate("Data Scientist job").await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(20), "took {elapsed:?}");
        for name in ["Python", "SQL", "Statistics"] {
            assert_eq!(generator.writes_for(name), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_sections_run_concurrently() {
        let generator = MockGenerator::new()
            .with_sections(three_body_plan())
            .with_write_delay("Introduction", Duration::from_secs(10))
            .with_write_delay("Roadmap", Duration::from_secs(10))
            .with_write_delay("Conclusion", Duration::from_secs(10));
        let (_generator, _web, orchestrator) = orchestrator(generator);

        let started = Instant::now();
        orchestrator.generate("Data Scientist job").await.unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(20), "took {elapsed:?}");
    }

    #[tokio::test]
    async fn test_failed_direct_section_gets_placeholder_in_plan_order() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .failing_writes_for("Conclusion");
        let (_generator, _web, orchestrator) = orchestrator(generator);

        let generated = orchestrator.generate("Data Scientist job").await.unwrap();

        assert_eq!(
            generated.report,
            "## Introduction\n\nIntroduction draft 1.\n\n\
             ## Python\n\nPython draft 1.\n\n\
             ## SQL\n\nSQL draft 1.\n\n\
             ## Conclusion\n\n> This section could not be generated (direct section writing)."
        );
        let conclusion = generated.sections.last().unwrap();
        assert_eq!(conclusion.name, "Conclusion");
        assert_eq!(conclusion.stop_reason, StopReason::Failed);
        assert_eq!(conclusion.iterations, 1);
    }

    #[tokio::test]
    async fn test_blank_direct_write_is_a_failure() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .blank_writes_for("Introduction");
        let (_generator, _web, orchestrator) = orchestrator(generator);

        let generated = orchestrator.generate("Data Scientist job").await.unwrap();

        assert!(generated.report.starts_with(
            "## Introduction\n\n> This section could not be generated (direct section writing).\n\n## Python"
        ));
        assert_eq!(generated.sections[0].stop_reason, StopReason::Failed);
    }

    #[tokio::test]
    async fn test_panicked_section_task_gets_placeholder() {
        let generator = MockGenerator::new()
            .with_sections(data_scientist_plan())
            .panicking_writes_for("SQL");
        let (_generator, _web, orchestrator) = orchestrator(generator);

        let generated = orchestrator.generate("Data Scientist job").await.unwrap();

        assert!(generated
            .report
            .contains("## SQL\n\n> This section could not be generated (task aborted).\n\n## Conclusion"));
        let sql = generated.sections.iter().find(|t| t.name == "SQL").unwrap();
        assert_eq!(sql.stop_reason, StopReason::Failed);
        assert_eq!(sql.iterations, 0);
    }
}
