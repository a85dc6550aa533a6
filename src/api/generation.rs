//! `/api/generation/*`: answer a question from retrieved context.

use crate::api::common::{self, Generated};
use crate::api::AppState;
use crate::error::Result;
use crate::prompts;
use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub question: String,
    pub response: String,
    pub sources_used: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

/// POST /api/generation/generate `{question}`
async fn generate(State(state): State<AppState>, body: Bytes) -> Result<Json<GenerateResponse>> {
    let body = common::parse_json_object(&body)?;
    let question = common::required_str(&body, "question")?.to_string();

    let Generated {
        response,
        sources_used,
    } = common::generate_with_context(&state, &question, prompts::GENERATION, "question")
        .await
        .map_err(|e| {
            log::error!("Generation failed: {}", e);
            e
        })?;

    Ok(Json(GenerateResponse {
        question,
        response,
        sources_used,
    }))
}
