// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting fragments only.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Appended to every prompt that turns search results into report content.
pub const SOURCE_DISCIPLINE_INSTRUCTION: &str = "\
    Base technical claims on the provided sources where they cover the topic. \
    Do NOT invent statistics, version numbers, or citations. \
    If the sources are empty or thin, write from well-established fundamentals only.";
