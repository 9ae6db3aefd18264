//! In-memory capability mocks for exercising the report pipeline without network.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::llm_client::{LlmError, OutputSchema, Prompt, StructuredGenerator};
use crate::report::models::Section;
use crate::search::{SearchError, WebResult, WebSearch};

/// Scripted grader decision for one write/grade attempt.
#[derive(Debug, Clone)]
pub enum GradeStep {
    Pass,
    Fail(Vec<&'static str>),
    FailWithoutFollowUps,
}

#[derive(Default)]
struct GeneratorLog {
    planning_query_calls: u32,
    query_calls: HashMap<String, u32>,
    writes: HashMap<String, u32>,
    grades: HashMap<String, u32>,
    text_prompts: Vec<(String, Prompt)>,
}

/// Scripted `StructuredGenerator`.
///
/// Output is chosen by schema name; per-section behaviour is keyed on the
/// `SECTION NAME:` line every section prompt carries. Drafts look like
/// `## {name}\n\n{name} draft {n}.` so tests can see which attempt produced them.
pub struct MockGenerator {
    sections: Vec<Section>,
    grades: HashMap<String, Vec<GradeStep>>,
    query_failures: HashSet<String>,
    grade_failures: HashSet<String>,
    write_delays: HashMap<String, Duration>,
    write_failures: HashSet<String>,
    blank_writes: HashSet<String>,
    panicking_writes: HashSet<String>,
    jd_valid: bool,
    planning_fails: bool,
    log: Mutex<GeneratorLog>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            sections: Vec::new(),
            grades: HashMap::new(),
            query_failures: HashSet::new(),
            grade_failures: HashSet::new(),
            write_delays: HashMap::new(),
            write_failures: HashSet::new(),
            blank_writes: HashSet::new(),
            panicking_writes: HashSet::new(),
            jd_valid: true,
            planning_fails: false,
            log: Mutex::new(GeneratorLog::default()),
        }
    }

    pub fn with_sections(mut self, sections: Vec<Section>) -> Self {
        self.sections = sections;
        self
    }

    /// Grades per attempt; the last step repeats. Sections without a script pass.
    pub fn with_grades(mut self, section: &str, steps: Vec<GradeStep>) -> Self {
        self.grades.insert(section.to_string(), steps);
        self
    }

    pub fn failing_queries_for(mut self, section: &str) -> Self {
        self.query_failures.insert(section.to_string());
        self
    }

    pub fn failing_grades_for(mut self, section: &str) -> Self {
        self.grade_failures.insert(section.to_string());
        self
    }

    pub fn with_write_delay(mut self, section: &str, delay: Duration) -> Self {
        self.write_delays.insert(section.to_string(), delay);
        self
    }

    pub fn failing_writes_for(mut self, section: &str) -> Self {
        self.write_failures.insert(section.to_string());
        self
    }

    /// The writer answers with whitespace only.
    pub fn blank_writes_for(mut self, section: &str) -> Self {
        self.blank_writes.insert(section.to_string());
        self
    }

    /// The writer panics, taking its task down with it.
    pub fn panicking_writes_for(mut self, section: &str) -> Self {
        self.panicking_writes.insert(section.to_string());
        self
    }

    pub fn rejecting_job_description(mut self) -> Self {
        self.jd_valid = false;
        self
    }

    pub fn failing_planning(mut self) -> Self {
        self.planning_fails = true;
        self
    }

    pub fn writes_for(&self, section: &str) -> u32 {
        self.log.lock().unwrap().writes.get(section).copied().unwrap_or(0)
    }

    pub fn grades_for(&self, section: &str) -> u32 {
        self.log.lock().unwrap().grades.get(section).copied().unwrap_or(0)
    }

    pub fn query_calls_for(&self, section: &str) -> u32 {
        self.log
            .lock()
            .unwrap()
            .query_calls
            .get(section)
            .copied()
            .unwrap_or(0)
    }

    pub fn planning_query_calls(&self) -> u32 {
        self.log.lock().unwrap().planning_query_calls
    }

    /// Prompts of every free-text call for `section`, in call order.
    pub fn text_prompts_for(&self, section: &str) -> Vec<Prompt> {
        self.log
            .lock()
            .unwrap()
            .text_prompts
            .iter()
            .filter(|(name, _)| name == section)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }

    fn queries(&self, prompt: &Prompt) -> Result<serde_json::Value, LlmError> {
        let count = marker(prompt, "NUMBER OF QUERIES:")
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(1);
        let label = match marker(prompt, "SECTION NAME:") {
            Some(section) => {
                *self
                    .log
                    .lock()
                    .unwrap()
                    .query_calls
                    .entry(section.clone())
                    .or_default() += 1;
                if self.query_failures.contains(&section) {
                    return Err(schema_failure("queries"));
                }
                section
            }
            None => {
                self.log.lock().unwrap().planning_query_calls += 1;
                if self.planning_fails {
                    return Err(schema_failure("queries"));
                }
                "planning".to_string()
            }
        };
        let queries: Vec<_> = (1..=count)
            .map(|i| json!({ "search_query": format!("{label} query {i}") }))
            .collect();
        Ok(json!({ "queries": queries }))
    }

    fn grade(&self, prompt: &Prompt) -> Result<serde_json::Value, LlmError> {
        let section = marker(prompt, "SECTION NAME:").unwrap_or_default();
        let attempt = {
            let mut log = self.log.lock().unwrap();
            let count = log.grades.entry(section.clone()).or_default();
            *count += 1;
            *count as usize - 1
        };
        if self.grade_failures.contains(&section) {
            return Err(schema_failure("grade"));
        }
        let step = self
            .grades
            .get(&section)
            .and_then(|steps| steps.get(attempt).or_else(|| steps.last()))
            .cloned()
            .unwrap_or(GradeStep::Pass);
        Ok(match step {
            GradeStep::Pass => json!({
                "grade": "pass",
                "follow_up_queries": [{"search_query": ""}]
            }),
            GradeStep::Fail(queries) => json!({
                "grade": "fail",
                "follow_up_queries": queries
                    .iter()
                    .map(|q| json!({ "search_query": q }))
                    .collect::<Vec<_>>()
            }),
            GradeStep::FailWithoutFollowUps => json!({
                "grade": "fail",
                "follow_up_queries": []
            }),
        })
    }
}

#[async_trait]
impl StructuredGenerator for MockGenerator {
    async fn generate_json(
        &self,
        prompt: &Prompt,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, LlmError> {
        match schema.name {
            "queries" => self.queries(prompt),
            "sections" => Ok(json!({ "sections": self.sections })),
            "grade" => self.grade(prompt),
            "jd_validation" => Ok(json!({
                "valid": if self.jd_valid { "valid" } else { "invalid" }
            })),
            other => panic!("MockGenerator has no script for schema '{other}'"),
        }
    }

    async fn generate_text(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let section = marker(prompt, "SECTION NAME:").unwrap_or_else(|| "untitled".to_string());
        if let Some(delay) = self.write_delays.get(&section) {
            tokio::time::sleep(*delay).await;
        }
        let n = {
            let mut log = self.log.lock().unwrap();
            log.text_prompts.push((section.clone(), prompt.clone()));
            let count = log.writes.entry(section.clone()).or_default();
            *count += 1;
            *count
        };
        if self.panicking_writes.contains(&section) {
            panic!("scripted writer panic for '{section}'");
        }
        if self.write_failures.contains(&section) {
            return Err(LlmError::Api {
                status: 500,
                message: "scripted writer failure".to_string(),
            });
        }
        if self.blank_writes.contains(&section) {
            return Ok("  \n".to_string());
        }
        Ok(format!("## {section}\n\n{section} draft {n}."))
    }
}

fn schema_failure(schema: &'static str) -> LlmError {
    LlmError::Schema {
        schema,
        attempts: 2,
        reason: "scripted failure".to_string(),
    }
}

/// Value of the first `key` line in the system prompt, then the user prompt.
fn marker(prompt: &Prompt, key: &str) -> Option<String> {
    [prompt.system.as_str(), prompt.user.as_str()]
        .iter()
        .find_map(|text| {
            text.lines()
                .find_map(|line| line.trim().strip_prefix(key))
                .map(|value| value.trim().to_string())
        })
}

/// Scripted `WebSearch`. Unknown queries get one synthetic result each.
pub struct MockWebSearch {
    results: HashMap<String, Vec<WebResult>>,
    failures: HashSet<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, u32)>>,
}

impl Default for MockWebSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl MockWebSearch {
    pub fn new() -> Self {
        Self {
            results: HashMap::new(),
            failures: HashSet::new(),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(mut self, query: &str, results: Vec<WebResult>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    pub fn with_failure(mut self, query: &str) -> Self {
        self.failures.insert(query.to_string());
        self
    }

    /// Every query takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// `(query, max_results)` for every call, in call order.
    pub fn calls(&self) -> Vec<(String, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.calls().into_iter().map(|(q, _)| q).collect()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<WebResult>, SearchError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), max_results));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.contains(query) {
            return Err(SearchError::Api {
                status: 503,
                message: "scripted outage".to_string(),
            });
        }
        if let Some(results) = self.results.get(query) {
            return Ok(results.clone());
        }
        let slug = query.replace(' ', "-");
        Ok(vec![WebResult {
            title: format!("About {query}"),
            url: format!("https://example.com/{slug}"),
            content: format!("Snippet about {query}"),
            raw_content: Some(format!("Body about {query}")),
        }])
    }
}
