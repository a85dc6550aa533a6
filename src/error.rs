use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Main error type for RAGQuery
#[derive(Error, Debug)]
pub enum RagQueryError {
    /// Malformed or unsupported request (missing body, unknown mode)
    #[error("{0}")]
    InvalidRequest(String),

    /// Vector store / retriever errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// LLM chain errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Prompt template errors
    #[error("Prompt template error: {0}")]
    Template(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RagQueryError {
    /// HTTP status this error maps to at the API boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            RagQueryError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RagQueryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            RagQueryError::InvalidRequest(msg) => msg.clone(),
            other => format!("An error occurred: {}", other),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Convenient Result type using RagQueryError
pub type Result<T> = std::result::Result<T, RagQueryError>;
