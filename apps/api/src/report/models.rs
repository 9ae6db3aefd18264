use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm_client::{OutputSchema, StructuredOutput};

// ────────────────────────────────────────────────────────────────────────────
// Sections and plan
// ────────────────────────────────────────────────────────────────────────────

/// One named unit of the report.
///
/// `content` starts empty and is only ever replaced by non-empty text
/// (see `set_content`), so a written section never reverts to blank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub description: String,
    #[serde(rename = "research")]
    pub requires_research: bool,
    #[serde(default)]
    pub content: String,
}

impl Section {
    pub fn new(name: &str, description: &str, requires_research: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            requires_research,
            content: String::new(),
        }
    }

    /// Replaces the content with `draft` unless the draft is blank.
    /// Returns whether the content changed.
    pub fn set_content(&mut self, draft: String) -> bool {
        if draft.trim().is_empty() {
            return false;
        }
        self.content = draft;
        true
    }

    pub fn is_written(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Planner output.
#[derive(Debug, Clone, Deserialize)]
pub struct Sections {
    pub sections: Vec<Section>,
}

impl StructuredOutput for Sections {
    const SCHEMA: OutputSchema = OutputSchema {
        name: "sections",
        shape: r#"{
  "sections": [
    {
      "name": "Python for Data Analysis",
      "description": "pandas and NumPy idioms the role relies on",
      "research": true,
      "content": ""
    }
  ]
}"#,
    };

    fn validate(&self) -> Result<(), String> {
        if self.sections.is_empty() {
            return Err("planner returned no sections".to_string());
        }
        let mut seen = HashSet::new();
        for section in &self.sections {
            let name = section.name.trim();
            if name.is_empty() {
                return Err("section with an empty name".to_string());
            }
            if !seen.insert(name.to_lowercase()) {
                return Err(format!("duplicate section name '{name}'"));
            }
        }
        Ok(())
    }
}

/// Ordered sections. Order is fixed at planning time and is the
/// presentation order of the final report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportPlan {
    sections: Vec<Section>,
}

impl ReportPlan {
    /// Builds a plan from planner output, trimming names and clearing any
    /// content the planner echoed back.
    pub fn new(sections: Vec<Section>) -> Self {
        let sections = sections
            .into_iter()
            .map(|s| Section::new(s.name.trim(), &s.description, s.requires_research))
            .collect();
        Self { sections }
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn research_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| s.requires_research)
    }

    pub fn direct_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().filter(|s| !s.requires_research)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Queries and grading
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub search_query: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Queries {
    pub queries: Vec<SearchQuery>,
}

impl Queries {
    /// Non-blank query strings, trimmed, in model order.
    pub fn into_strings(self) -> Vec<String> {
        non_blank(self.queries)
    }
}

impl StructuredOutput for Queries {
    const SCHEMA: OutputSchema = OutputSchema {
        name: "queries",
        shape: r#"{"queries": [{"search_query": "pandas groupby performance best practices"}]}"#,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
}

/// Grader output for one section draft.
#[derive(Debug, Clone, Deserialize)]
pub struct Grade {
    pub grade: Verdict,
    #[serde(default)]
    pub follow_up_queries: Vec<SearchQuery>,
}

impl Grade {
    pub fn passed(&self) -> bool {
        self.grade == Verdict::Pass
    }

    /// Usable follow-up queries. The grader is told to send empty strings on a
    /// pass, so blanks are dropped here.
    pub fn follow_ups(&self) -> Vec<String> {
        non_blank(self.follow_up_queries.clone())
    }
}

impl StructuredOutput for Grade {
    const SCHEMA: OutputSchema = OutputSchema {
        name: "grade",
        shape: r#"{
  "grade": "fail",
  "follow_up_queries": [{"search_query": "SQL window functions interview questions"}]
}"#,
    };
}

fn non_blank(queries: Vec<SearchQuery>) -> Vec<String> {
    queries
        .into_iter()
        .map(|q| q.search_query.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Completion tracking
// ────────────────────────────────────────────────────────────────────────────

/// Why a section stopped being worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Grader passed the draft.
    Passed,
    /// Iteration ceiling hit with the grade still failing.
    CeilingReached,
    /// Grader failed the draft but gave no follow-up queries.
    Stalled,
    /// Report deadline passed; the latest draft was kept.
    DeadlineExceeded,
    /// Non-research section, written once without grading.
    WrittenDirectly,
    /// Generation failed; content is a placeholder.
    Failed,
}

/// Per-section summary returned alongside the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionTrace {
    pub name: String,
    pub research: bool,
    /// Write/grade attempts made (1 for direct sections, 0 for failures before the first write).
    pub iterations: u32,
    pub stop_reason: StopReason,
}

#[derive(Debug, Clone)]
pub struct CompletedSection {
    pub section: Section,
    pub trace: SectionTrace,
}

/// Finished sections keyed by name, filled in completion order.
#[derive(Debug, Default)]
pub struct CompletedSections {
    by_name: HashMap<String, CompletedSection>,
}

impl CompletedSections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, completed: CompletedSection) {
        self.by_name
            .insert(completed.section.name.clone(), completed);
    }

    pub fn get(&self, name: &str) -> Option<&CompletedSection> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

}

/// Final product of one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub report_id: Uuid,
    pub report: String,
    pub sections: Vec<SectionTrace>,
    pub generated_at: DateTime<Utc>,
}
