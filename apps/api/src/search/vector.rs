//! Optional vector-store source: OpenAI embeddings + Pinecone query.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::search::SearchError;

const OPENAI_EMBEDDING_API_URL: &str = "https://api.openai.com/v1/embeddings";
pub const EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// A stored chunk returned by the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub text: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, SearchError>;
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn query(&self, embedding: &[f32], top_k: u32) -> Result<Vec<VectorMatch>, SearchError>;
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI embeddings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, SearchError> {
        let response = self
            .client
            .post(OPENAI_EMBEDDING_API_URL)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: EMBEDDING_MODEL,
                input: query,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        parse_embedding(&response.text().await?)
    }
}

fn parse_embedding(body: &str) -> Result<Vec<f32>, SearchError> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("embedding response: {e}")))?;
    parsed
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| SearchError::Parse("embedding response had no vectors".to_string()))
}

// ────────────────────────────────────────────────────────────────────────────
// Pinecone
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PineconeQuery<'a> {
    vector: &'a [f32],
    top_k: u32,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct PineconeResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    #[serde(default)]
    metadata: serde_json::Map<String, serde_json::Value>,
}

/// Queries one Pinecone index over its data-plane host.
#[derive(Clone)]
pub struct PineconeIndex {
    client: Client,
    api_key: String,
    host: String,
}

impl PineconeIndex {
    pub fn new(api_key: String, host: String) -> Self {
        let host = if host.starts_with("http") {
            host
        } else {
            format!("https://{host}")
        };
        Self {
            client: Client::new(),
            api_key,
            host: host.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl VectorSearch for PineconeIndex {
    async fn query(&self, embedding: &[f32], top_k: u32) -> Result<Vec<VectorMatch>, SearchError> {
        let response = self
            .client
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .json(&PineconeQuery {
                vector: embedding,
                top_k,
                include_metadata: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        parse_matches(&response.text().await?)
    }
}

/// Matches without a `text` metadata field carry nothing to show and are dropped.
fn parse_matches(body: &str) -> Result<Vec<VectorMatch>, SearchError> {
    let parsed: PineconeResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("Pinecone response: {e}")))?;
    Ok(parsed
        .matches
        .into_iter()
        .filter_map(|m| {
            let text = m.metadata.get("text")?.as_str()?.to_string();
            Some(VectorMatch {
                text,
                metadata: m.metadata,
            })
        })
        .collect())
}
