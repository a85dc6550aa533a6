//! The LLM side of the pipeline: a populated prompt goes in, generated text comes out.

pub mod openai;

pub use openai::OpenAIChat;

use crate::error::Result;
use async_trait::async_trait;

/// Executes a fully rendered prompt against a language model
#[async_trait]
pub trait Chain: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String>;
}
