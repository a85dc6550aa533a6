//! Helpers shared by the dispatcher and the blueprints.

use crate::api::AppState;
use crate::chain::Chain;
use crate::error::{RagQueryError, Result};
use crate::prompts::{PromptTemplate, PromptTemplates};
use crate::retrieval::Document;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Number of documents fed to the LLM as context
pub const CONTEXT_K: usize = 8;

/// Separator between documents in a formatted context string
pub const DOC_SEPARATOR: &str = "\n\n";

pub const NO_JSON_DATA: &str = "No JSON data provided";

/// Join document contents, in retrieval order, into one context string
pub fn format_docs(docs: &[Document]) -> String {
    docs.iter()
        .map(|doc| doc.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOC_SEPARATOR)
}

pub fn get_prompt_template<'a>(prompts: &'a PromptTemplates, name: &str) -> Result<&'a PromptTemplate> {
    prompts.get(name)
}

/// Render `template` with `inputs` and run it through the chain
pub async fn run_chain(
    chain: &dyn Chain,
    template: &PromptTemplate,
    inputs: &HashMap<&str, String>,
) -> Result<String> {
    let prompt = template.format(inputs)?;
    log::debug!(
        "Running chain with template '{}' ({} chars)",
        template.name(),
        prompt.len()
    );
    chain.invoke(&prompt).await
}

/// Output of a retrieve-then-generate round
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub response: String,
    pub sources_used: usize,
}

/// Retrieve `CONTEXT_K` documents for `query`, then answer it with the named template.
///
/// # Arguments
///
/// * `state` - Shared retriever, chain and prompt registry
/// * `query` - User text, used both for retrieval and as a template input
/// * `template_name` - Registered template to render (e.g. [`crate::prompts::GENERATION`])
/// * `query_variable` - Placeholder that receives `query`; `{context}` gets the documents
///
/// # Returns
///
/// The chain's answer and how many documents went into the context
pub async fn generate_with_context(
    state: &AppState,
    query: &str,
    template_name: &str,
    query_variable: &str,
) -> Result<Generated> {
    let docs = state
        .retriever
        .get_relevant_documents(query, CONTEXT_K)
        .await?;
    let context = format_docs(&docs);

    let template = get_prompt_template(&state.prompts, template_name)?;
    let inputs = HashMap::from([
        ("context", context),
        (query_variable, query.to_string()),
    ]);

    let response = run_chain(state.chain.as_ref(), template, &inputs).await?;

    Ok(Generated {
        response,
        sources_used: docs.len(),
    })
}

/// Parse a request body that must be a non-empty JSON object.
///
/// Empty bodies and "empty" JSON values (`{}`, `[]`, `null`, `""`, `0`, `false`)
/// count as no data.
pub fn parse_json_object(body: &[u8]) -> Result<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(RagQueryError::InvalidRequest(NO_JSON_DATA.to_string()));
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| RagQueryError::InvalidRequest(format!("Invalid JSON: {}", e)))?;

    match value {
        Value::Object(map) if !map.is_empty() => Ok(map),
        Value::Object(_) | Value::Null | Value::Bool(false) => {
            Err(RagQueryError::InvalidRequest(NO_JSON_DATA.to_string()))
        }
        Value::Array(ref items) if items.is_empty() => {
            Err(RagQueryError::InvalidRequest(NO_JSON_DATA.to_string()))
        }
        Value::String(ref s) if s.is_empty() => {
            Err(RagQueryError::InvalidRequest(NO_JSON_DATA.to_string()))
        }
        Value::Number(ref n) if n.as_f64() == Some(0.0) => {
            Err(RagQueryError::InvalidRequest(NO_JSON_DATA.to_string()))
        }
        _ => Err(RagQueryError::InvalidRequest(
            "Request body must be a JSON object".to_string(),
        )),
    }
}

/// Optional string field; present-but-not-a-string is a bad request
pub fn optional_str<'a>(body: &'a Map<String, Value>, field: &str) -> Result<Option<&'a str>> {
    match body.get(field) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(RagQueryError::InvalidRequest(format!(
            "Field '{}' must be a string",
            field
        ))),
    }
}

pub fn required_str<'a>(body: &'a Map<String, Value>, field: &str) -> Result<&'a str> {
    optional_str(body, field)?.ok_or_else(|| {
        RagQueryError::InvalidRequest(format!("Missing required field '{}'", field))
    })
}
