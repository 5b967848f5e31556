//! Wayang Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with sensible defaults for local runs. The resulting [`AppConfig`]
//! is passed explicitly to every pipeline constructor.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Input and output file locations
    pub paths: PathsConfig,

    /// Corpus column mapping
    pub corpus: CorpusConfig,

    /// Entity extraction settings
    pub ner: NerConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Relationship extraction settings
    pub relations: RelationsConfig,

    /// Graph database connection
    pub graph: GraphConfig,

    /// Question answering settings
    pub rag: RagConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&std::path::Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path)?.with_env_override(),
            None => Self::from_env(),
        }
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Paths
        if let Ok(path) = std::env::var("WAYANG_CORPUS_PATH") {
            self.paths.corpus_path = path.into();
        }
        if let Ok(path) = std::env::var("WAYANG_ENTITIES_PATH") {
            self.paths.entities_path = path.into();
        }
        if let Ok(path) = std::env::var("WAYANG_RELATIONS_PATH") {
            self.paths.relations_path = path.into();
        }

        // Span labeling model
        if let Ok(url) = std::env::var("NER_ENDPOINT") {
            self.ner.endpoint = url;
        }
        if let Ok(token) = std::env::var("HF_API_TOKEN") {
            self.ner.api_token = Some(token);
        }
        if let Ok(value) = std::env::var("NER_CONFIDENCE_THRESHOLD") {
            self.ner.confidence_threshold =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "NER_CONFIDENCE_THRESHOLD".to_string(),
                    value,
                })?;
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            self.llm.gemini_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            self.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
            self.llm.embedding_model = model;
        }

        // Neo4j
        if let Ok(uri) = std::env::var("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Ok(user) = std::env::var("NEO4J_USER") {
            self.graph.user = user;
        }
        if let Ok(pass) = std::env::var("NEO4J_PASSWORD") {
            self.graph.password = pass;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }
}

/// Input and output file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Corpus CSV file
    pub corpus_path: PathBuf,

    /// Entity record list (written by extraction, read by later stages)
    pub entities_path: PathBuf,

    /// Relationship record list
    pub relations_path: PathBuf,

    /// Optional gold reference file; the built-in list is used when absent
    pub gold_path: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/Sakri_Lahir dan Hastimurti_Gugur.csv"),
            entities_path: PathBuf::from("data/ner_results.json"),
            relations_path: PathBuf::from("data/relationships.json"),
            gold_path: None,
        }
    }
}

/// Corpus column mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Column holding the narrative text
    pub text_column: String,

    /// Column holding the story title
    pub title_column: String,

    /// Column holding the sub-heading
    pub subtitle_column: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            text_column: "Teks".to_string(),
            title_column: "Judul".to_string(),
            subtitle_column: "Subjudul".to_string(),
        }
    }
}

/// What the pipeline driver does when one row fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowFailurePolicy {
    /// Log and continue with the next row
    #[default]
    Skip,
    /// Stop the run on the first failure
    Abort,
}

/// Entity extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NerConfig {
    /// Token classification endpoint
    pub endpoint: String,

    /// Bearer token for the endpoint
    pub api_token: Option<String>,

    /// Spans below this confidence are rejected before repair
    pub confidence_threshold: f32,

    /// Rows whose preprocessed text is shorter are skipped
    pub min_text_chars: usize,

    /// Cleaned names shorter than this are rejected
    pub min_entity_chars: usize,

    /// Names rejected when they match exactly
    pub blocklist: Vec<String>,

    /// Log progress every N rows
    pub progress_every: usize,

    /// Per-row failure handling
    pub failure_policy: RowFailurePolicy,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            endpoint:
                "https://api-inference.huggingface.co/models/cahya/bert-base-indonesian-ner"
                    .to_string(),
            api_token: None,
            // Catches names like "Arya Basusara" scored at 0.61
            confidence_threshold: 0.60,
            min_text_chars: 5,
            min_entity_chars: 3,
            blocklist: [
                "Sang", "Para", "Yang", "Dan", "Di", "Ke", "Dari", "Saat", "Ketika", "Maka",
                "Lalu", "Akan", "Telah", "Sudah", "Ia", "Dia", "Mereka", "Hal",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            progress_every: 10,
            failure_policy: RowFailurePolicy::Skip,
            timeout_secs: 60,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for compatible APIs)
    pub openai_base_url: Option<String>,

    /// Gemini API key
    pub gemini_api_key: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            openai_api_key: None,
            openai_base_url: None,
            gemini_api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gemini-2.5-flash".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Gemini,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Relationship extraction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationsConfig {
    /// Rows with shorter raw text are not sent to the model
    pub min_text_chars: usize,

    /// Only entities above this confidence constrain the prompt
    pub min_entity_confidence: f32,

    /// Minimum spacing between model calls in milliseconds
    pub request_interval_ms: u64,
}

impl Default for RelationsConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            min_entity_confidence: 0.6,
            request_interval_ms: 1000,
        }
    }
}

/// Graph database connection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Bolt URI
    pub uri: String,

    /// Username
    pub user: String,

    /// Password
    pub password: String,

    /// Connectivity checks before giving up
    pub connect_attempts: u32,

    /// Delay between connectivity checks in milliseconds
    pub connect_retry_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            connect_attempts: 30,
            connect_retry_ms: 1000,
        }
    }
}

/// Question answering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Number of documents from semantic search
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
