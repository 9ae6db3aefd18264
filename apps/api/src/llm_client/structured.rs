//! Structured generation capability.
//!
//! Report code never formats JSON instructions itself: it asks a
//! `StructuredGenerator` for a value of a `StructuredOutput` type and gets
//! either a validated `T` or `LlmError::Schema`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::LlmError;

/// Attempts made by `generate_structured*` before giving up on a schema.
pub const MAX_SCHEMA_ATTEMPTS: u32 = 2;

/// A system + user message pair.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Name and JSON shape of an expected output. `shape` is shown to the model verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub shape: &'static str,
}

/// A type the model can be asked to produce.
pub trait StructuredOutput: DeserializeOwned + Send {
    const SCHEMA: OutputSchema;

    /// Semantic checks serde cannot express. `Err` triggers another attempt.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// LLM capability shared (read-only) by every concurrent section task.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    /// Returns raw JSON the model produced for `schema`.
    async fn generate_json(
        &self,
        prompt: &Prompt,
        schema: &OutputSchema,
    ) -> Result<serde_json::Value, LlmError>;

    /// Free-text generation (section writing). Never returns an empty string.
    async fn generate_text(&self, prompt: &Prompt) -> Result<String, LlmError>;
}

/// Generates a `T`, retrying malformed or invalid output.
pub async fn generate_structured<T: StructuredOutput>(
    generator: &dyn StructuredGenerator,
    prompt: &Prompt,
) -> Result<T, LlmError> {
    generate_structured_checked(generator, prompt, |_: &T| Ok(())).await
}

/// Like `generate_structured`, with an extra caller-specific check
/// (e.g. an exact item count) applied after `T::validate`.
pub async fn generate_structured_checked<T, F>(
    generator: &dyn StructuredGenerator,
    prompt: &Prompt,
    check: F,
) -> Result<T, LlmError>
where
    T: StructuredOutput,
    F: Fn(&T) -> Result<(), String> + Send + Sync,
{
    let schema = T::SCHEMA;
    let mut last_reason = String::from("no attempts made");

    for attempt in 1..=MAX_SCHEMA_ATTEMPTS {
        let raw = match generator.generate_json(prompt, &schema).await {
            Ok(raw) => raw,
            Err(e) if e.is_malformed_output() => {
                warn!(
                    "Structured output '{}' attempt {}/{} unusable: {}",
                    schema.name, attempt, MAX_SCHEMA_ATTEMPTS, e
                );
                last_reason = e.to_string();
                continue;
            }
            Err(e) => return Err(e),
        };

        let value: T = match serde_json::from_value(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    "Structured output '{}' attempt {}/{} failed to deserialize: {}",
                    schema.name, attempt, MAX_SCHEMA_ATTEMPTS, e
                );
                last_reason = e.to_string();
                continue;
            }
        };

        if let Err(reason) = value.validate().and_then(|_| check(&value)) {
            warn!(
                "Structured output '{}' attempt {}/{} rejected: {}",
                schema.name, attempt, MAX_SCHEMA_ATTEMPTS, reason
            );
            last_reason = reason;
            continue;
        }

        return Ok(value);
    }

    Err(LlmError::Schema {
        schema: schema.name,
        attempts: MAX_SCHEMA_ATTEMPTS,
        reason: last_reason,
    })
}
