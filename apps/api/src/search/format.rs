//! Context formatting for search results handed to the LLM.

use std::borrow::Cow;
use std::collections::HashSet;

use tracing::warn;

use crate::search::vector::VectorMatch;
use crate::search::WebResult;

/// Appended to a source body cut at the character budget.
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Rough characters-per-token ratio used to turn a token budget into a char budget.
const CHARS_PER_TOKEN: usize = 4;

/// Character budget for one source body.
pub fn max_chars_per_source(max_tokens_per_source: usize) -> usize {
    max_tokens_per_source * CHARS_PER_TOKEN
}

/// Cuts `body` to exactly `max_chars` characters plus `TRUNCATION_MARKER`.
/// Bodies at or under the budget are returned unmodified.
pub fn truncate_body(body: &str, max_chars: usize) -> Cow<'_, str> {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &body[..cut])),
        None => Cow::Borrowed(body),
    }
}

/// Flattens per-query result batches, keeps the first occurrence of each source
/// and renders them into one delimited blob. Returns an empty string when there
/// is nothing to show.
pub fn format_web_sources(batches: Vec<Vec<WebResult>>, max_tokens_per_source: usize) -> String {
    let char_limit = max_chars_per_source(max_tokens_per_source);
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();

    for source in batches.into_iter().flatten() {
        if seen.insert(source_identity(&source).to_string()) {
            unique.push(source);
        }
    }

    if unique.is_empty() {
        return String::new();
    }

    let rule = "=".repeat(80);
    let thin_rule = "-".repeat(80);
    let mut out = String::from("Content from sources:\n");

    for source in &unique {
        let raw = match source.raw_content.as_deref() {
            Some(raw) => raw,
            None => {
                warn!("No raw_content found for source {}", source.url);
                ""
            }
        };
        let body = truncate_body(raw, char_limit);

        out.push_str(&format!("{rule}\n"));
        out.push_str(&format!("Source: {}\n", source.title));
        out.push_str(&format!("{thin_rule}\n"));
        out.push_str(&format!("URL: {}\n===\n", source.url));
        out.push_str(&format!(
            "Most relevant content from source: {}\n===\n",
            source.content
        ));
        out.push_str(&format!(
            "Full source content limited to {max_tokens_per_source} tokens: {body}\n\n"
        ));
        out.push_str(&format!("{rule}\n\n"));
    }

    out.trim().to_string()
}

/// URL when present, title otherwise.
fn source_identity(source: &WebResult) -> &str {
    if source.url.is_empty() {
        &source.title
    } else {
        &source.url
    }
}

/// Renders vector-store matches as `Text / Title / Author` blocks.
pub fn format_vector_matches(matches: &[VectorMatch]) -> String {
    matches
        .iter()
        .map(|m| {
            format!(
                "Text: {}\nTitle: {}\nAuthor: {}\n",
                m.text,
                metadata_str(m, "title"),
                metadata_str(m, "author")
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

fn metadata_str<'a>(m: &'a VectorMatch, key: &str) -> &'a str {
    m.metadata
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or("N/A")
}
