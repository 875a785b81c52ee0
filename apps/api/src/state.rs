use std::sync::Arc;

use crate::analysis::orchestrator::MatchAnalyzer;
use crate::config::Config;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// The analysis pipeline with its extractor, AI client, fallback and store.
    pub analyzer: Arc<MatchAnalyzer>,
}
