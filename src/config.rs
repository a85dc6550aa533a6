use crate::prompts::PromptTemplate;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub retriever: RetrieverConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    /// File the configuration was read from; `None` when running on defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
    /// Empty means any origin is allowed
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl ServerConfig {
    /// Socket address string the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            allowed_origins: Vec::new(),
        }
    }
}

/// Vector-store retriever configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieverConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_base_url")]
    pub embedding_base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            embedding_model: default_embedding_model(),
            embedding_base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// LLM chain configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_chat_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Optional overrides for the built-in prompt templates
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptsConfig {
    pub generation: Option<String>,
    pub comparative: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("vectorstore.db")
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_temperature() -> f32 {
    0.0
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> usize {
    2
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. `path`, when given
    /// 2. Path specified in RAGQUERY_CONFIG environment variable
    /// 3. ./config.toml in current directory
    ///
    /// A missing ./config.toml falls back to defaults; an explicitly named file must exist.
    ///
    /// Values are not validated here: callers apply command-line overrides first and
    /// then call [`Config::validate`] once.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenv::dotenv();

        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RAGQUERY_CONFIG").ok().map(PathBuf::from));

        match explicit {
            Some(config_path) => Self::from_file(&config_path),
            None => {
                let default_path = PathBuf::from("config.toml");
                if default_path.exists() {
                    Self::from_file(&default_path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn from_file(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        config.source = Some(config_path.to_path_buf());

        Ok(config)
    }

    /// Apply command-line overrides on top of the loaded file
    ///
    /// `debug` can only switch debug mode on; an absent flag keeps the file's value.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>, debug: bool) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self.server.debug |= debug;
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be greater than 0");
        }

        if !(0.0..=2.0).contains(&self.generation.temperature) {
            anyhow::bail!("generation.temperature must be between 0.0 and 2.0");
        }

        if self.generation.timeout_secs == 0 {
            anyhow::bail!("generation.timeout_secs must be greater than 0");
        }

        if let Some(template) = &self.prompts.generation {
            PromptTemplate::parse("generation", template)?
                .ensure_variables(&["context", "question"])?;
        }

        if let Some(template) = &self.prompts.comparative {
            PromptTemplate::parse("comparative", template)?
                .ensure_variables(&["context", "comparison_query"])?;
        }

        Ok(())
    }

    /// Default log filter implied by the debug flag
    pub fn log_level(&self) -> &'static str {
        if self.server.debug {
            "debug"
        } else {
            "info"
        }
    }
}
