//! Named prompt templates with `{placeholder}` substitution.
//!
//! `{{` and `}}` render as literal braces.

use crate::config::PromptsConfig;
use crate::error::{RagQueryError, Result};
use std::collections::HashMap;

/// Template used by the `generation` mode
pub const GENERATION: &str = "generation";
/// Template used by the `comparative` mode
pub const COMPARATIVE: &str = "comparative";

const DEFAULT_GENERATION_TEMPLATE: &str = concat!(
    "You are an assistant for question-answering tasks. Use the following pieces of ",
    "retrieved context to answer the question. If the answer cannot be found in the ",
    "context, say that you don't know. Be precise and cite details from the context.\n\n",
    "Context:\n{context}\n\n",
    "Question: {question}\n\n",
    "Answer:"
);

const DEFAULT_COMPARATIVE_TEMPLATE: &str = concat!(
    "You are an analyst performing a comparative analysis. Using only the retrieved ",
    "context below, compare and contrast the subjects named in the request. Lay out ",
    "their similarities and their differences, and state plainly where the context ",
    "does not cover one side of the comparison.\n\n",
    "Context:\n{context}\n\n",
    "Comparison request: {comparison_query}\n\n",
    "Comparative analysis:"
);

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed prompt template
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    template: String,
    segments: Vec<Segment>,
    input_variables: Vec<String>,
}

impl PromptTemplate {
    /// Parse a template string, collecting its input variables in order of first use
    pub fn parse(name: &str, template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut input_variables: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut var = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) if ch.is_alphanumeric() || ch == '_' => var.push(ch),
                            Some(ch) => {
                                return Err(RagQueryError::Template(format!(
                                    "template '{}': invalid character '{}' in placeholder",
                                    name, ch
                                )))
                            }
                            None => {
                                return Err(RagQueryError::Template(format!(
                                    "template '{}': unterminated placeholder '{{{}'",
                                    name, var
                                )))
                            }
                        }
                    }
                    if var.is_empty() {
                        return Err(RagQueryError::Template(format!(
                            "template '{}': empty placeholder",
                            name
                        )));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    if !input_variables.contains(&var) {
                        input_variables.push(var.clone());
                    }
                    segments.push(Segment::Variable(var));
                }
                '}' => {
                    return Err(RagQueryError::Template(format!(
                        "template '{}': unmatched '}}'",
                        name
                    )))
                }
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            name: name.to_string(),
            template: template.to_string(),
            segments,
            input_variables,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in order of first appearance
    pub fn input_variables(&self) -> &[String] {
        &self.input_variables
    }

    /// Fail if the template uses any placeholder outside `allowed`
    pub fn ensure_variables(&self, allowed: &[&str]) -> Result<()> {
        let unknown: Vec<&str> = self
            .input_variables
            .iter()
            .map(String::as_str)
            .filter(|v| !allowed.contains(v))
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(RagQueryError::Template(format!(
                "template '{}' uses unsupported variables: {} (allowed: {})",
                self.name,
                unknown.join(", "),
                allowed.join(", ")
            )))
        }
    }

    /// Render the template
    ///
    /// # Arguments
    ///
    /// * `inputs` - Value for each placeholder name; extra entries are ignored
    ///
    /// # Returns
    ///
    /// The rendered prompt, or a `Template` error naming the first placeholder
    /// without a value
    pub fn format(&self, inputs: &HashMap<&str, String>) -> Result<String> {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(var) => {
                    let value = inputs.get(var.as_str()).ok_or_else(|| {
                        RagQueryError::Template(format!(
                            "missing input variable '{}' for template '{}'",
                            var, self.name
                        ))
                    })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

/// Registry of named prompt templates
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptTemplates {
    /// Built-in templates with any configured overrides applied
    pub fn from_config(config: &PromptsConfig) -> Result<Self> {
        let generation = config
            .generation
            .as_deref()
            .unwrap_or(DEFAULT_GENERATION_TEMPLATE);
        let comparative = config
            .comparative
            .as_deref()
            .unwrap_or(DEFAULT_COMPARATIVE_TEMPLATE);

        let mut templates = Self {
            templates: HashMap::new(),
        };
        templates.register(PromptTemplate::parse(GENERATION, generation)?);
        templates.register(PromptTemplate::parse(COMPARATIVE, comparative)?);
        Ok(templates)
    }

    pub fn register(&mut self, template: PromptTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Result<&PromptTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| RagQueryError::Template(format!("unknown prompt template '{}'", name)))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for PromptTemplates {
    fn default() -> Self {
        let mut templates = Self {
            templates: HashMap::new(),
        };
        // Built-in templates are constants known to parse.
        for (name, text) in [
            (GENERATION, DEFAULT_GENERATION_TEMPLATE),
            (COMPARATIVE, DEFAULT_COMPARATIVE_TEMPLATE),
        ] {
            if let Ok(template) = PromptTemplate::parse(name, text) {
                templates.register(template);
            }
        }
        templates
    }
}
