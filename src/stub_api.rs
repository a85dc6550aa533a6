//! Scripted OpenAI-style HTTP endpoint for client tests.
//!
//! Answers the n-th request with the n-th scripted response; once the script
//! runs out the last response repeats.

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
struct Script {
    responses: Arc<Vec<(StatusCode, Value)>>,
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

pub struct StubApi {
    pub base_url: String,
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

impl StubApi {
    /// Serve `responses` on POST `path` from a listener on an ephemeral local port
    pub async fn spawn(path: &str, responses: Vec<(StatusCode, Value)>) -> Self {
        let script = Script {
            responses: Arc::new(responses),
            requests: Arc::default(),
        };
        let requests = Arc::clone(&script.requests);

        let app = Router::new().route(path, post(respond)).with_state(script);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}/v1", addr),
            requests,
        }
    }

    pub fn attempts(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// JSON bodies received, oldest first
    pub fn bodies(&self) -> Vec<Value> {
        self.requests.lock().unwrap().iter().map(|(_, body)| body.clone()).collect()
    }

    pub fn authorization(&self, index: usize) -> Option<String> {
        self.requests.lock().unwrap()[index].0.clone()
    }
}

async fn respond(
    State(script): State<Script>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .map(String::from);

    let index = {
        let mut requests = script.requests.lock().unwrap();
        requests.push((auth, body));
        requests.len() - 1
    };

    let (status, payload) = script
        .responses
        .get(index)
        .or_else(|| script.responses.last())
        .cloned()
        .unwrap_or((StatusCode::OK, Value::Null));
    (status, Json(payload))
}
