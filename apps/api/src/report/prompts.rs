// All LLM prompt templates for report generation.
// Placeholders are `{name}` tokens filled in one pass by `fill`.
// `SECTION NAME:` and `NUMBER OF QUERIES:` lines are kept on their own line so
// a prompt can be traced back to its section in logs.

/// Built-in report layout used when `REPORT_STRUCTURE` is not set.
pub const DEFAULT_REPORT_STRUCTURE: &str = r#"Use the following structure to generate a report on user provided job description:

1. Introduction (no research needed)
    - Highlight top technical skills, tools and technologies needed for the job
    - Structured table with 3 columns: Technical skill, Description, Importance (Required, Preferred)

2. Roadmap (no research needed)
    - mermaid markdown code for a flowchart diagram of the recommended roadmap to achieve the preparation for the topic divided into 3 sections (Fundamentals, Intermediate, Advanced)
    - Each node in the diagram should have a name of the concept

3. Main Body Sections (research needed)
    - Each section should focus on a concept that is relevant to the job description
    - Provide at least 1 structured element (either a list or a table) per section that is relevant to the concept/skill discussed in the section
    - Include at least 3 multiple choice questions per section that tests the understanding of the concept/skill discussed in the section

4. Conclusion (no research needed)
    - Aim for 1 structural element that distills the main concepts covered in the main body sections
    - Provide a concise summary of the report"#;

// ────────────────────────────────────────────────────────────────────────────
// Planning
// ────────────────────────────────────────────────────────────────────────────

/// Replace: {topic}, {report_organization}, {number_of_queries}
pub const PLANNER_QUERY_SYSTEM: &str = r#"You are an expert technical interviewer helping a candidate plan an interview preparation guide.

The guide is built from this job description:
{topic}

The guide must follow this structure:
{report_organization}

Write search queries that gather what is needed to plan the guide's sections:
- the core technical skills, tools and technologies the role requires
- how those skills are typically assessed in interviews for this kind of role

NUMBER OF QUERIES: {number_of_queries}
Return exactly that many queries. Make each query specific and self-contained."#;

pub const PLANNER_QUERY_USER: &str =
    "Generate search queries that will help with planning a comprehensive interview preparation guide.";

/// Replace: {topic}, {report_organization}, {context}
pub const PLANNER_SYSTEM: &str = r#"You are planning the sections of an interview preparation guide.

JOB DESCRIPTION:
{topic}

REQUIRED STRUCTURE:
{report_organization}

CONTEXT FROM WEB RESEARCH (use it to pick the most relevant skills):
{context}

Rules:
1. Produce at least one section for every top-level part of the structure.
2. Each section has: name (unique), description (the concept or skill it covers), research (true only for main body sections), content (empty string).
3. Main body sections each cover ONE concept or skill that matters for this job. No overlapping sections.
4. Introduction, roadmap and conclusion never need research.
5. Keep sections in presentation order."#;

/// Replace: {min_body_sections}
pub const PLANNER_USER: &str = "Generate the sections of the report. Your response must include at least {min_body_sections} main body sections with each 'sections' field containing a list of sections. \
    Each section must have: name, description, research, and content fields.";

// ────────────────────────────────────────────────────────────────────────────
// Section research loop
// ────────────────────────────────────────────────────────────────────────────

/// Replace: {topic}, {section_name}, {section_topic}, {number_of_queries}
pub const QUERY_WRITER_SYSTEM: &str = r#"You are an expert technical writer crafting targeted web search queries for one section of an interview preparation guide.

JOB DESCRIPTION:
{topic}

SECTION NAME: {section_name}
SECTION TOPIC: {section_topic}
NUMBER OF QUERIES: {number_of_queries}

Write exactly that many queries. Together they should cover:
- core definitions and how the concept works
- practical usage in the kind of work this job describes
- common interview questions and pitfalls for the concept"#;

pub const QUERY_WRITER_USER: &str = "Generate search queries on the provided topic.";

pub const SECTION_WRITER_SYSTEM: &str = r#"You are an expert technical writer producing one section of an interview preparation guide.

Section requirements:
1. Start with a `## ` heading that is exactly the section name. Do not add a report title.
2. Explain the concept clearly, as it applies to the job description.
3. Include at least 1 structured element (a list or a table).
4. Include at least 3 multiple choice questions. For each: the question, 4 options labelled A-D, and the correct answer with a one-line explanation.
5. End with a short `### Sources` list of the URLs you relied on, if any.
6. Output Markdown only, with no preamble."#;

/// Replace: {topic}, {section_name}, {section_topic}, {context}, {section_content}, {source_discipline}
pub const SECTION_WRITER_INPUTS: &str = r#"JOB DESCRIPTION:
{topic}

SECTION NAME: {section_name}
SECTION TOPIC: {section_topic}

EXISTING SECTION CONTENT (improve on it; empty on the first draft):
{section_content}

SOURCE MATERIAL:
{context}

{source_discipline}"#;

/// Replace: {topic}, {section_name}, {section_topic}, {section}, {number_of_follow_up_queries}
pub const SECTION_GRADER_SYSTEM: &str = r#"Review a section of an interview preparation guide.

JOB DESCRIPTION:
{topic}

SECTION NAME: {section_name}
SECTION TOPIC: {section_topic}

SECTION CONTENT:
{section}

Grade the section "pass" only if ALL hold:
- it explains the section topic accurately and in enough depth for an interview
- it contains at least 1 list or table
- it contains at least 3 multiple choice questions with answers

Otherwise grade it "fail" and write {number_of_follow_up_queries} follow-up search queries that would gather the missing information."#;

pub const SECTION_GRADER_USER: &str = "Grade the report and consider follow-up questions for missing information. \
    If the grade is 'pass', return empty strings for all follow-up queries. \
    If the grade is 'fail', provide specific search queries to gather missing information.";

// ────────────────────────────────────────────────────────────────────────────
// Direct sections (introduction, roadmap, conclusion)
// ────────────────────────────────────────────────────────────────────────────

/// Replace: {topic}, {section_name}, {section_topic}, {context}
pub const FINAL_SECTION_WRITER_SYSTEM: &str = r#"You are an expert technical writer crafting a section that synthesizes the rest of an interview preparation guide.

JOB DESCRIPTION:
{topic}

SECTION NAME: {section_name}
SECTION TOPIC: {section_topic}

ALREADY WRITTEN RESEARCH SECTIONS:
{context}

Guidelines by section kind:
- Introduction: a `## ` heading, 1-2 short paragraphs, then a Markdown table with columns Technical skill | Description | Importance (Required or Preferred).
- Roadmap: a `## ` heading and a ```mermaid flowchart``` divided into Fundamentals, Intermediate and Advanced, one node per concept covered by the research sections.
- Conclusion: a `## ` heading, one structural element (list or table) distilling the main concepts, and a concise summary.

Start with a `## ` heading that is exactly the section name. Output Markdown only, with no preamble."#;

pub const FINAL_SECTION_WRITER_USER: &str =
    "Generate a report section based on the provided sources.";

// ────────────────────────────────────────────────────────────────────────────
// Job description validation
// ────────────────────────────────────────────────────────────────────────────

pub const JD_VALIDATION_SYSTEM: &str = "You screen inputs to an interview preparation tool. \
    Decide whether the text is a job description or job posting: it names a role and \
    describes responsibilities, requirements or skills. Greetings, questions, code, \
    and unrelated prose are not job descriptions.";

/// Replace: {topic}
pub const JD_VALIDATION_USER: &str = r#"Is the following text a valid job description? Answer "valid" or "invalid".

TEXT:
{topic}"#;

/// Substitutes every `{name}` token whose name appears in `values`, in a single
/// left-to-right pass. Inserted text is never rescanned; unknown tokens stay as-is.
pub fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (close, *value))
        });
        match value {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
