//! `/api/retrieval/*`: direct access to the retriever.

use crate::api::common;
use crate::api::AppState;
use crate::error::{RagQueryError, Result};
use crate::retrieval::Document;
use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::Serialize;

const DEFAULT_K: usize = 10;
const MAX_K: usize = 50;

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<Document>,
    pub total_results: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/search", post(search))
}

/// `k` defaults to 10 and is clamped to 1..=50
fn parse_k(body: &serde_json::Map<String, serde_json::Value>) -> Result<usize> {
    match body.get("k") {
        None => Ok(DEFAULT_K),
        Some(value) => value
            .as_u64()
            .map(|k| (k as usize).clamp(1, MAX_K))
            .ok_or_else(|| {
                RagQueryError::InvalidRequest("Field 'k' must be a non-negative integer".to_string())
            }),
    }
}

/// POST /api/retrieval/search `{query, k?}`
async fn search(State(state): State<AppState>, body: Bytes) -> Result<Json<SearchResponse>> {
    let body = common::parse_json_object(&body)?;
    let query = common::required_str(&body, "query")?.to_string();
    let k = parse_k(&body)?;

    let results = state.retriever.get_relevant_documents(&query, k).await.map_err(|e| {
        log::error!("Retrieval search failed: {}", e);
        e
    })?;
    log::info!("Retrieval search returned {} documents (k={})", results.len(), k);

    Ok(Json(SearchResponse {
        query,
        total_results: results.len(),
        results,
    }))
}
