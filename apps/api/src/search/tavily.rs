//! Tavily web search adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::search::{SearchError, WebResult, WebSearch};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    include_raw_content: bool,
    topic: &'a str,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    raw_content: Option<String>,
}

impl From<TavilyResult> for WebResult {
    fn from(r: TavilyResult) -> Self {
        WebResult {
            title: r.title,
            url: r.url,
            content: r.content,
            raw_content: r.raw_content,
        }
    }
}

#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: String,
}

impl TavilyClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[async_trait]
impl WebSearch for TavilyClient {
    async fn search(&self, query: &str, max_results: u32) -> Result<Vec<WebResult>, SearchError> {
        let body = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results,
            include_raw_content: true,
            topic: "general",
        };

        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let text = response.text().await?;
        parse_response(&text)
    }
}

fn parse_response(body: &str) -> Result<Vec<WebResult>, SearchError> {
    let parsed: TavilyResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("Tavily response: {e}")))?;
    Ok(parsed.results.into_iter().map(WebResult::from).collect())
}
