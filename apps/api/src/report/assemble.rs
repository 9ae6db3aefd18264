//! Fan-in helpers: formatting finished research sections as writer context,
//! and compiling the final document in plan order.

use crate::report::models::{CompletedSections, ReportPlan, Section, SectionTrace};
use crate::report::ReportError;

const RULE_WIDTH: usize = 60;
const NOT_WRITTEN: &str = "[Not yet written]";

/// Formats the plan's research sections, in plan order, as context for the
/// direct writer. Sections missing from `completed` are skipped.
pub fn collect(plan: &ReportPlan, completed: &CompletedSections) -> String {
    let sections: Vec<&Section> = plan
        .research_sections()
        .filter_map(|planned| completed.get(&planned.name))
        .map(|done| &done.section)
        .collect();
    format_sections(&sections)
}

/// Numbered, rule-delimited rendering of sections. Deterministic for a given input order.
pub fn format_sections(sections: &[&Section]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();
    for (idx, section) in sections.iter().enumerate() {
        let content = if section.is_written() {
            section.content.as_str()
        } else {
            NOT_WRITTEN
        };
        out.push_str(&format!(
            "\n{rule}\nSection {}: {}\n{rule}\nDescription:\n{}\nRequires Research: \n{}\n\nContent:\n{}\n\n",
            idx + 1,
            section.name,
            section.description,
            section.requires_research,
            content
        ));
    }
    out
}

/// Joins every planned section's content in plan order, separated by a blank line.
///
/// Fails if a planned section never completed or completed blank.
pub fn compile(plan: &ReportPlan, completed: &CompletedSections) -> Result<String, ReportError> {
    let mut parts = Vec::with_capacity(plan.len());
    for planned in plan.sections() {
        let done = completed
            .get(&planned.name)
            .ok_or_else(|| ReportError::MissingSection(planned.name.clone()))?;
        if !done.section.is_written() {
            return Err(ReportError::EmptySection(planned.name.clone()));
        }
        parts.push(done.section.content.trim());
    }
    Ok(parts.join("\n\n"))
}

/// Traces of completed sections in plan order.
pub fn traces(plan: &ReportPlan, completed: &CompletedSections) -> Vec<SectionTrace> {
    plan.sections()
        .iter()
        .filter_map(|planned| completed.get(&planned.name))
        .map(|done| done.trace.clone())
        .collect()
}
