pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // CV extraction preview
        .route(
            "/api/v1/cv/extract",
            post(handlers::handle_extract_cv).layer(upload_limit.clone()),
        )
        // Match analyses (append-only)
        .route(
            "/api/v1/analyses",
            post(handlers::handle_create_analysis).get(handlers::handle_list_analyses),
        )
        .route(
            "/api/v1/analyses/upload",
            post(handlers::handle_upload_analysis).layer(upload_limit),
        )
        .route("/api/v1/analyses/:id", get(handlers::handle_get_analysis))
        .with_state(state)
}
