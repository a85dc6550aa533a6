//! HTTP surface: the home route, the `/api/query` dispatcher and the three
//! mode-specific blueprints mounted under `/api/{retrieval,generation,comparative}`.

pub mod common;
pub mod comparative;
pub mod generation;
pub mod query;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod test_support;

use crate::chain::Chain;
use crate::prompts::PromptTemplates;
use crate::retrieval::Retriever;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Collaborators shared by every handler; built once at startup, never mutated
#[derive(Clone)]
pub struct AppState {
    pub retriever: Arc<dyn Retriever>,
    pub chain: Arc<dyn Chain>,
    pub prompts: Arc<PromptTemplates>,
}

impl AppState {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        chain: Arc<dyn Chain>,
        prompts: PromptTemplates,
    ) -> Self {
        Self {
            retriever,
            chain,
            prompts: Arc::new(prompts),
        }
    }
}

/// All application routes, without transport layers
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/query", post(query::handle_query))
        .nest("/api/retrieval", retrieval::router())
        .nest("/api/generation", generation::router())
        .nest("/api/comparative", comparative::router())
        .with_state(state)
}

/// GET / - static endpoint listing
async fn home() -> Json<Value> {
    Json(json!({
        "message": "RAG API is running!",
        "endpoints": {
            "query": "/api/query",
            "retrieval": "/api/retrieval/*",
            "generation": "/api/generation/*",
            "comparative": "/api/comparative/*"
        }
    }))
}
