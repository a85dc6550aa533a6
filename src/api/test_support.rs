//! Stub collaborators and request helpers for handler tests.

use crate::api::AppState;
use crate::chain::Chain;
use crate::error::{RagQueryError, Result};
use crate::prompts::PromptTemplates;
use crate::retrieval::{Document, Retriever};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Returns (a prefix of) a fixed document list and records every call
#[derive(Clone, Default)]
pub struct StaticRetriever {
    docs: Vec<Document>,
    calls: Arc<Mutex<Vec<(String, usize)>>>,
}

impl StaticRetriever {
    pub fn new(docs: Vec<Document>) -> Self {
        Self {
            docs,
            calls: Arc::default(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// `n` documents "doc 0".."doc n-1", each tagged with its index
    pub fn numbered(n: usize) -> Self {
        Self::new(
            (0..n)
                .map(|i| Document::new(format!("doc {}", i)).with_metadata("index", i))
                .collect(),
        )
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn get_relevant_documents(&self, query: &str, k: usize) -> Result<Vec<Document>> {
        self.calls.lock().unwrap().push((query.to_string(), k));
        Ok(self.docs.iter().take(k).cloned().collect())
    }
}

pub struct FailingRetriever(pub &'static str);

#[async_trait]
impl Retriever for FailingRetriever {
    async fn get_relevant_documents(&self, _query: &str, _k: usize) -> Result<Vec<Document>> {
        Err(RagQueryError::Retrieval(self.0.to_string()))
    }
}

/// Answers with `echo: <prompt>` and records the prompts it saw
#[derive(Clone, Default)]
pub struct EchoChain {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl EchoChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Chain for EchoChain {
    async fn invoke(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("echo: {}", prompt))
    }
}

pub struct FailingChain(pub &'static str);

#[async_trait]
impl Chain for FailingChain {
    async fn invoke(&self, _prompt: &str) -> Result<String> {
        Err(RagQueryError::Generation(self.0.to_string()))
    }
}

pub fn test_state(retriever: impl Retriever + 'static, chain: impl Chain + 'static) -> AppState {
    AppState::new(Arc::new(retriever), Arc::new(chain), PromptTemplates::default())
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub async fn send_raw(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.unwrap()
}

/// Send a request and decode the JSON response body
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = send_raw(app, request).await;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
