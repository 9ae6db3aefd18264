//! Search: turns a batch of queries into one formatted context blob.
//!
//! Web search is mandatory; vector search is an optional second source that is
//! only wired when configured. Search failures are never fatal: a failed query
//! is logged and skipped, and the caller gets whatever context was gathered
//! (possibly an empty string). Quality is judged later by the section grader.

pub mod format;
pub mod tavily;
pub mod vector;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::search::format::{format_vector_matches, format_web_sources};
use crate::search::vector::{Embedder, VectorSearch};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Parse(String),
}

/// One web search hit. `raw_content` is the full page body when the provider
/// could fetch it.
#[derive(Debug, Clone, PartialEq)]
pub struct WebResult {
    pub title: String,
    pub url: String,
    pub content: String,
    pub raw_content: Option<String>,
}

/// Full-text web search capability.
#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<WebResult>, SearchError>;
}

#[derive(Clone)]
struct VectorSource {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorSearch>,
    top_k: u32,
}

/// Read-only search handle, cloned into every section task.
#[derive(Clone)]
pub struct SearchClient {
    web: Arc<dyn WebSearch>,
    vector: Option<VectorSource>,
    max_tokens_per_source: usize,
}

impl SearchClient {
    pub fn new(web: Arc<dyn WebSearch>, max_tokens_per_source: usize) -> Self {
        Self {
            web,
            vector: None,
            max_tokens_per_source,
        }
    }

    /// Adds vector search as a second source for every batch.
    pub fn with_vector_search(
        mut self,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorSearch>,
        top_k: u32,
    ) -> Self {
        self.vector = Some(VectorSource {
            embedder,
            index,
            top_k,
        });
        self
    }

    pub fn has_vector_search(&self) -> bool {
        self.vector.is_some()
    }

    /// Runs every query concurrently and formats the deduplicated results.
    pub async fn search(&self, queries: &[String], max_results: u32) -> String {
        let outcomes = join_all(queries.iter().map(|q| self.web.search(q, max_results))).await;

        let mut batches = Vec::with_capacity(queries.len());
        for (query, outcome) in queries.iter().zip(outcomes) {
            match outcome {
                Ok(results) => {
                    debug!(query = %query, "Web search returned {} results", results.len());
                    batches.push(results);
                }
                Err(e) => warn!(query = %query, "Web search failed, continuing without it: {e}"),
            }
        }

        let mut context = format_web_sources(batches, self.max_tokens_per_source);

        if let Some(vector) = &self.vector {
            let vector_context = search_vectors(vector, queries).await;
            if !vector_context.is_empty() {
                if !context.is_empty() {
                    context.push_str("\n\n");
                }
                context.push_str(&vector_context);
            }
        }

        context
    }
}

async fn search_vectors(source: &VectorSource, queries: &[String]) -> String {
    let lookups = queries.iter().map(|query| async move {
        let embedding = source.embedder.embed_query(query).await?;
        source.index.query(&embedding, source.top_k).await
    });

    let mut blocks = Vec::new();
    for (query, outcome) in queries.iter().zip(join_all(lookups).await) {
        match outcome {
            Ok(matches) if matches.is_empty() => {}
            Ok(matches) => blocks.push(format_vector_matches(&matches)),
            Err(e) => warn!(query = %query, "Vector search failed, continuing without it: {e}"),
        }
    }
    blocks.join("\n---\n")
}
