//! Job description screening: rejects inputs that are not job postings
//! before any search or planning work is spent on them.

use serde::Deserialize;
use tracing::info;

use crate::llm_client::{
    generate_structured, LlmError, OutputSchema, Prompt, StructuredGenerator, StructuredOutput,
};
use crate::report::prompts::{fill, JD_VALIDATION_SYSTEM, JD_VALIDATION_USER};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validity {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobDescriptionValidation {
    pub valid: Validity,
}

impl StructuredOutput for JobDescriptionValidation {
    const SCHEMA: OutputSchema = OutputSchema {
        name: "jd_validation",
        shape: r#"{"valid": "valid"}"#,
    };
}

/// Asks the model whether `topic` is a job description.
pub async fn validate_job_description(
    generator: &dyn StructuredGenerator,
    topic: &str,
) -> Result<bool, LlmError> {
    let prompt = Prompt::new(
        JD_VALIDATION_SYSTEM,
        fill(JD_VALIDATION_USER, &[("topic", topic)]),
    );
    let verdict: JobDescriptionValidation = generate_structured(generator, &prompt).await?;
    info!("Job description validation: {:?}", verdict.valid);
    Ok(verdict.valid == Validity::Valid)
}
