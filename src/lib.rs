pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod db;
pub mod embeddings;
pub mod error;
pub mod prompts;
pub mod retrieval;
pub mod server;

#[cfg(test)]
pub(crate) mod stub_api;

pub use api::AppState;
pub use config::Config;
pub use error::{RagQueryError, Result};
pub use server::HttpServer;
