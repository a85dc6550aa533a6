//! `/api/comparative/*`: contrastive analysis over retrieved context.

use crate::api::common::{self, Generated};
use crate::api::AppState;
use crate::error::Result;
use crate::prompts;
use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub comparison_query: String,
    pub response: String,
    pub sources_used: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}

/// POST /api/comparative/analyze `{comparison_query}`
async fn analyze(State(state): State<AppState>, body: Bytes) -> Result<Json<AnalyzeResponse>> {
    let body = common::parse_json_object(&body)?;
    let comparison_query = common::required_str(&body, "comparison_query")?.to_string();

    let Generated {
        response,
        sources_used,
    } = common::generate_with_context(
        &state,
        &comparison_query,
        prompts::COMPARATIVE,
        "comparison_query",
    )
    .await
    .map_err(|e| {
        log::error!("Comparative analysis failed: {}", e);
        e
    })?;

    Ok(Json(AnalyzeResponse {
        comparison_query,
        response,
        sources_used,
    }))
}
