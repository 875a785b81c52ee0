mod analysis;
mod config;
mod errors;
mod llm_client;
mod models;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::extractor::FileTextExtractor;
use crate::analysis::heuristic::KeywordOverlapScorer;
use crate::analysis::orchestrator::MatchAnalyzer;
use crate::analysis::store::{AnalysisStore, InMemoryAnalysisStore, PgAnalysisStore};
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first; malformed values abort startup.
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Recruit API v{}", env!("CARGO_PKG_VERSION"));

    // Analysis store: PostgreSQL when configured, otherwise process memory
    let store: Arc<dyn AnalysisStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgAnalysisStore::connect(url, config.database_max_connections).await?),
        None => {
            warn!("DATABASE_URL not set; analyses are kept in memory and lost on restart");
            Arc::new(InMemoryAnalysisStore::new())
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.ai.clone())?;
    if llm.is_configured() {
        info!("LLM client initialized (model: {})", llm.model());
    } else {
        info!("OPENAI_API_KEY not set; analyses use the keyword fallback");
    }

    let analyzer = MatchAnalyzer::new(
        Arc::new(FileTextExtractor),
        Arc::new(llm),
        Arc::new(KeywordOverlapScorer),
        store,
    );

    let state = AppState {
        config: config.clone(),
        analyzer: Arc::new(analyzer),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the recruiter frontend domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
