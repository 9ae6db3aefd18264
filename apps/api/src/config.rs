use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::report::prompts::DEFAULT_REPORT_STRUCTURE;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub tavily_api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub report: ReportSettings,
    /// Present only when every vector-search variable is set.
    pub vector_search: Option<VectorSearchConfig>,
}

/// Knobs for one report generation run.
#[derive(Debug, Clone)]
pub struct ReportSettings {
    /// Search queries per planning round and per section round.
    pub number_of_queries: usize,
    /// Ceiling on section loop iterations; also `max_results` per section search.
    pub max_search_depth: u32,
    /// Vector-search results per query, when vector search is wired.
    pub top_k: u32,
    /// Token budget per source body (4 chars per token).
    pub max_tokens_per_source: usize,
    /// `max_results` per query during planning.
    pub planning_results_per_query: u32,
    /// Fewer research sections than this logs a quality warning.
    pub min_body_sections: usize,
    /// Outstanding section loops are force-stopped after this long.
    pub report_deadline: Option<Duration>,
    pub validate_job_description: bool,
    pub report_structure: String,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            number_of_queries: 2,
            max_search_depth: 2,
            top_k: 2,
            max_tokens_per_source: 4000,
            planning_results_per_query: 2,
            min_body_sections: 8,
            report_deadline: None,
            validate_job_description: true,
            report_structure: DEFAULT_REPORT_STRUCTURE.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct VectorSearchConfig {
    pub pinecone_api_key: String,
    pub pinecone_index_host: String,
    pub openai_api_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ReportSettings::default();

        let report = ReportSettings {
            number_of_queries: parse_or(&lookup, "NUMBER_OF_QUERIES", defaults.number_of_queries)?,
            max_search_depth: parse_or(&lookup, "MAX_SEARCH_DEPTH", defaults.max_search_depth)?,
            top_k: parse_or(&lookup, "TOP_K", defaults.top_k)?,
            max_tokens_per_source: parse_or(
                &lookup,
                "MAX_TOKENS_PER_SOURCE",
                defaults.max_tokens_per_source,
            )?,
            planning_results_per_query: parse_or(
                &lookup,
                "PLANNING_RESULTS_PER_QUERY",
                defaults.planning_results_per_query,
            )?,
            min_body_sections: parse_or(&lookup, "MIN_BODY_SECTIONS", defaults.min_body_sections)?,
            report_deadline: lookup("REPORT_DEADLINE_SECS")
                .map(|v| {
                    v.parse::<u64>()
                        .context("REPORT_DEADLINE_SECS must be a whole number of seconds")
                })
                .transpose()?
                .map(Duration::from_secs),
            validate_job_description: parse_or(
                &lookup,
                "VALIDATE_JOB_DESCRIPTION",
                defaults.validate_job_description,
            )?,
            report_structure: lookup("REPORT_STRUCTURE")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.report_structure),
        };

        if report.number_of_queries == 0 {
            anyhow::bail!("NUMBER_OF_QUERIES must be at least 1");
        }

        let vector_search = match (
            lookup("PINECONE_API_KEY"),
            lookup("PINECONE_INDEX_HOST"),
            lookup("OPENAI_API_KEY"),
        ) {
            (Some(pinecone_api_key), Some(pinecone_index_host), Some(openai_api_key)) => {
                Some(VectorSearchConfig {
                    pinecone_api_key,
                    pinecone_index_host,
                    openai_api_key,
                })
            }
            _ => None,
        };

        Ok(Config {
            anthropic_api_key: require(&lookup, "ANTHROPIC_API_KEY")?,
            tavily_api_key: require(&lookup, "TAVILY_API_KEY")?,
            port: parse_or(&lookup, "PORT", 8080)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            report,
            vector_search,
        })
    }
}

fn require(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
