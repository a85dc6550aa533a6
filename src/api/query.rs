//! `POST /api/query`: the single entry point that picks retrieval, generation
//! or comparative handling from the request's `mode`.

use crate::api::common::{self, Generated};
use crate::api::AppState;
use crate::error::{RagQueryError, Result};
use crate::prompts;
use crate::retrieval::Document;
use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use std::str::FromStr;
use uuid::Uuid;

/// Documents returned by a retrieval-mode query
pub const RETRIEVAL_K: usize = 10;

/// Query text used when the request omits `query`
pub const DEFAULT_QUERY: &str = "What is the purpose of this document?";

pub const INVALID_MODE: &str =
    "Invalid mode selected. Choose 'retrieval', 'generation', or 'comparative'.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Retrieval,
    Generation,
    Comparative,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Retrieval => "retrieval",
            Mode::Generation => "generation",
            Mode::Comparative => "comparative",
        }
    }
}

impl FromStr for Mode {
    type Err = RagQueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "retrieval" => Ok(Mode::Retrieval),
            "generation" => Ok(Mode::Generation),
            "comparative" => Ok(Mode::Comparative),
            _ => Err(RagQueryError::InvalidRequest(INVALID_MODE.to_string())),
        }
    }
}

/// A validated query request; absent fields take their defaults
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub mode: Mode,
    pub query: String,
}

impl QueryRequest {
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let body = common::parse_json_object(body)?;

        let mode = match body.get("mode") {
            None => Mode::default(),
            Some(serde_json::Value::String(s)) => s.parse()?,
            Some(_) => return Err(RagQueryError::InvalidRequest(INVALID_MODE.to_string())),
        };
        // A non-string query is passed through and rejected by the retrieval step,
        // so it surfaces as a server error rather than a bad request.
        let query = match body.get("query") {
            None => DEFAULT_QUERY.to_string(),
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => {
                return Err(RagQueryError::Retrieval(format!(
                    "query must be a string, got {}",
                    other
                )))
            }
        };

        Ok(Self { mode, query })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Retrieval {
        mode: Mode,
        query: String,
        results: Vec<Document>,
        total_results: usize,
    },
    Generated {
        mode: Mode,
        query: String,
        response: String,
        sources_used: usize,
    },
}

/// Run one query against the collaborators
pub async fn dispatch(state: &AppState, request: QueryRequest) -> Result<QueryResponse> {
    let QueryRequest { mode, query } = request;

    let (template, query_variable) = match mode {
        Mode::Retrieval => {
            let results = state
                .retriever
                .get_relevant_documents(&query, RETRIEVAL_K)
                .await?;
            return Ok(QueryResponse::Retrieval {
                mode,
                query,
                total_results: results.len(),
                results,
            });
        }
        Mode::Generation => (prompts::GENERATION, "question"),
        Mode::Comparative => (prompts::COMPARATIVE, "comparison_query"),
    };

    let Generated {
        response,
        sources_used,
    } = common::generate_with_context(state, &query, template, query_variable).await?;

    Ok(QueryResponse::Generated {
        mode,
        query,
        response,
        sources_used,
    })
}

/// POST /api/query
pub async fn handle_query(
    State(state): State<AppState>,
    body: Bytes,
) -> std::result::Result<Json<QueryResponse>, RagQueryError> {
    let request_id = Uuid::new_v4();
    let start = std::time::Instant::now();

    let request = QueryRequest::from_body(&body).map_err(|e| {
        log::warn!("[{}] Rejected query: {}", request_id, e);
        e
    })?;
    log::info!(
        "[{}] Query received: mode={} query_len={}",
        request_id,
        request.mode.as_str(),
        request.query.len()
    );

    match dispatch(&state, request).await {
        Ok(response) => {
            let count = match &response {
                QueryResponse::Retrieval { total_results, .. } => *total_results,
                QueryResponse::Generated { sources_used, .. } => *sources_used,
            };
            log::info!(
                "[{}] Query completed in {:?} ({} documents)",
                request_id,
                start.elapsed(),
                count
            );
            Ok(Json(response))
        }
        Err(e) => {
            log::error!("[{}] Query failed after {:?}: {}", request_id, start.elapsed(), e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::routes;
    use crate::api::test_support::*;
    use axum::http::StatusCode;
    use serde_json::json;

    #[test]
    fn test_mode_parsing_is_case_insensitive() {
        assert_eq!("retrieval".parse::<Mode>().unwrap(), Mode::Retrieval);
        assert_eq!("Generation".parse::<Mode>().unwrap(), Mode::Generation);
        assert_eq!("COMPARATIVE".parse::<Mode>().unwrap(), Mode::Comparative);
        assert!("summary".parse::<Mode>().is_err());
        assert!("".parse::<Mode>().is_err());
    }

    #[test]
    fn test_request_defaults() {
        let request = QueryRequest::from_body(br#"{"other": 1}"#).unwrap();
        assert_eq!(request.mode, Mode::Retrieval);
        assert_eq!(request.query, DEFAULT_QUERY);
    }

    #[test]
    fn test_request_keeps_empty_query() {
        let request = QueryRequest::from_body(br#"{"mode": "generation", "query": ""}"#).unwrap();
        assert_eq!(request.mode, Mode::Generation);
        assert_eq!(request.query, "");
    }

    #[test]
    fn test_request_rejects_non_string_mode() {
        for body in [r#"{"mode": 3}"#, r#"{"mode": null}"#, r#"{"mode": ["retrieval"]}"#] {
            let err = QueryRequest::from_body(body.as_bytes()).unwrap_err();
            assert_eq!(err.to_string(), INVALID_MODE);
        }
    }

    #[test]
    fn test_request_rejects_non_string_query() {
        let err = QueryRequest::from_body(br#"{"query": 42}"#).unwrap_err();
        assert!(matches!(err, RagQueryError::Retrieval(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_non_string_query_is_internal_error() {
        let retriever = StaticRetriever::numbered(3);
        let app = routes(test_state(retriever.clone(), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"mode":"retrieval","query":["a","b"]}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("An error occurred: "));
        assert!(message.contains("query must be a string"));
        assert!(retriever.calls().is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_returns_documents_unchanged() {
        let docs = vec![
            Document::new("alpha").with_metadata("source", "a.pdf").with_metadata("page", 1),
            Document::new("beta").with_metadata("tags", json!(["x", "y"])),
            Document::new("gamma"),
        ];
        let retriever = StaticRetriever::new(docs.clone());
        let app = routes(test_state(retriever.clone(), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"mode":"retrieval","query":"x"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "retrieval");
        assert_eq!(body["query"], "x");
        assert_eq!(body["total_results"], 3);
        assert_eq!(body["results"], serde_json::to_value(&docs).unwrap());
        assert_eq!(retriever.calls(), vec![("x".to_string(), RETRIEVAL_K)]);
    }

    #[tokio::test]
    async fn test_retrieval_caps_at_ten() {
        let app = routes(test_state(StaticRetriever::numbered(25), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"query":"x"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 10);
        assert_eq!(body["total_results"], 10);
    }

    #[tokio::test]
    async fn test_retrieval_with_no_documents() {
        let app = routes(test_state(StaticRetriever::empty(), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"mode":"retrieval","query":"x"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"], json!([]));
        assert_eq!(body["total_results"], 0);
    }

    #[tokio::test]
    async fn test_default_mode_and_query() {
        let retriever = StaticRetriever::numbered(1);
        let app = routes(test_state(retriever.clone(), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"unrelated": true}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "retrieval");
        assert_eq!(body["query"], DEFAULT_QUERY);
        assert_eq!(retriever.calls()[0].0, DEFAULT_QUERY);
    }

    #[tokio::test]
    async fn test_generation_mode() {
        let retriever = StaticRetriever::numbered(3);
        let chain = EchoChain::new();
        let app = routes(test_state(retriever.clone(), chain.clone()));

        let (status, body) = send(
            app,
            post_json("/api/query", r#"{"mode":"generation","query":"What is doc 1?"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "generation");
        assert_eq!(body["query"], "What is doc 1?");
        assert_eq!(body["sources_used"], 3);
        assert!(body["response"].as_str().unwrap().starts_with("echo: "));
        assert!(body.get("results").is_none());

        assert_eq!(retriever.calls(), vec![("What is doc 1?".to_string(), 8)]);
        let prompts = chain.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("doc 0\n\ndoc 1\n\ndoc 2"));
        assert!(prompts[0].contains("Question: What is doc 1?"));
    }

    #[tokio::test]
    async fn test_generation_sources_capped_at_eight() {
        let app = routes(test_state(StaticRetriever::numbered(20), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"mode":"generation","query":"x"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sources_used"], 8);
    }

    #[tokio::test]
    async fn test_comparative_mode_uses_comparative_template() {
        let chain = EchoChain::new();
        let app = routes(test_state(StaticRetriever::numbered(5), chain.clone()));

        let (status, body) = send(
            app,
            post_json("/api/query", r#"{"mode":"Comparative","query":"tokio vs async-std"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "comparative");
        assert_eq!(body["sources_used"], 5);

        let prompts = chain.prompts();
        assert!(prompts[0].contains("Comparison request: tokio vs async-std"));
        assert!(!prompts[0].contains("Question:"));
    }

    #[tokio::test]
    async fn test_invalid_mode_is_bad_request() {
        let retriever = StaticRetriever::numbered(2);
        let app = routes(test_state(retriever.clone(), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"mode":"summarize","query":"x"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], INVALID_MODE);
        assert!(retriever.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_body_is_bad_request() {
        for raw in ["", "{}", "null"] {
            let app = routes(test_state(StaticRetriever::empty(), EchoChain::new()));
            let (status, body) = send(app, post_json("/api/query", raw)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", raw);
            assert_eq!(body["error"], "No JSON data provided");
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = routes(test_state(StaticRetriever::empty(), EchoChain::new()));

        let (status, body) = send(app, post_json("/api/query", r#"{"mode": "retrieval""#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON"));
    }

    #[tokio::test]
    async fn test_chain_failure_is_internal_error() {
        let app = routes(test_state(StaticRetriever::numbered(2), FailingChain("model is overloaded")));

        let (status, body) = send(app, post_json("/api/query", r#"{"mode":"generation","query":"x"}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let error = body["error"].as_str().unwrap();
        assert!(error.starts_with("An error occurred: "));
        assert!(error.contains("model is overloaded"));
    }

    #[tokio::test]
    async fn test_retriever_failure_is_internal_error() {
        for mode in ["retrieval", "generation", "comparative"] {
            let app = routes(test_state(FailingRetriever("index unavailable"), EchoChain::new()));
            let request = format!(r#"{{"mode":"{}","query":"x"}}"#, mode);

            let (status, body) = send(app, post_json("/api/query", &request)).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert!(body["error"].as_str().unwrap().contains("index unavailable"));
        }
    }

    #[tokio::test]
    async fn test_dispatch_without_http() {
        let state = test_state(StaticRetriever::numbered(4), EchoChain::new());
        let request = QueryRequest {
            mode: Mode::Retrieval,
            query: "q".to_string(),
        };

        match dispatch(&state, request).await.unwrap() {
            QueryResponse::Retrieval {
                results,
                total_results,
                ..
            } => {
                assert_eq!(total_results, 4);
                assert_eq!(results.len(), total_results);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
