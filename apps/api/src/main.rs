mod config;
mod errors;
mod llm_client;
mod report;
mod routes;
mod search;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::{LlmClient, PLANNER_MODEL, WRITER_MODEL};
use crate::report::orchestrator::ReportOrchestrator;
use crate::report::Capabilities;
use crate::routes::build_router;
use crate::search::tavily::TavilyClient;
use crate::search::vector::{OpenAiEmbedder, PineconeIndex};
use crate::search::SearchClient;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting prepdoc API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM clients
    let planner = LlmClient::new(config.anthropic_api_key.clone(), PLANNER_MODEL);
    let writer = LlmClient::new(config.anthropic_api_key.clone(), WRITER_MODEL);
    info!("LLM clients initialized (planner: {PLANNER_MODEL}, writer: {WRITER_MODEL})");

    // Initialize search
    let settings = config.report.clone();
    let mut search = SearchClient::new(
        Arc::new(TavilyClient::new(config.tavily_api_key.clone())),
        settings.max_tokens_per_source,
    );
    if let Some(vector) = &config.vector_search {
        search = search.with_vector_search(
            Arc::new(OpenAiEmbedder::new(vector.openai_api_key.clone())),
            Arc::new(PineconeIndex::new(
                vector.pinecone_api_key.clone(),
                vector.pinecone_index_host.clone(),
            )),
            settings.top_k,
        );
    }
    info!(
        vector_search = search.has_vector_search(),
        "Search client initialized"
    );

    info!(
        number_of_queries = settings.number_of_queries,
        max_search_depth = settings.max_search_depth,
        deadline_secs = ?settings.report_deadline.map(|d| d.as_secs()),
        "Report settings loaded"
    );

    let caps = Capabilities {
        planner: Arc::new(planner),
        writer: Arc::new(writer),
        search,
    };

    // Build app state
    let state = AppState {
        orchestrator: Arc::new(ReportOrchestrator::new(caps, settings)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
