//! Wayang Core - Domain records, traits, and shared types
//!
//! This crate defines the abstractions shared across the wayang-kg workspace:
//! - Entity and relation records exchanged between pipeline stages
//! - Corpus rows
//! - Common error types
//! - Traits for the generative model and embedding collaborators
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, CorpusConfig, GraphConfig, LlmConfig, LlmProvider, LoggingConfig,
    NerConfig, PathsConfig, RagConfig, RelationsConfig, RowFailurePolicy,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for wayang-kg operations
#[derive(Error, Debug)]
pub enum WayangError {
    #[error("Input not found: {}", path.display())]
    InputMissing { path: PathBuf },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Span labeler error: {0}")]
    Labeler(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WayangError {
    /// Build an `InputMissing` error for a path
    pub fn input_missing(path: impl Into<PathBuf>) -> Self {
        Self::InputMissing { path: path.into() }
    }
}

impl From<ConfigError> for WayangError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WayangError>;

// ============================================================================
// Entity Labels
// ============================================================================

/// Canonical entity label
///
/// Serialized as `"Person"`, `"Location"` or `"Organization"`. Parsing is
/// case-insensitive so records written by other tools still load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EntityLabel {
    Person,
    Location,
    Organization,
}

impl EntityLabel {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "Person",
            Self::Location => "Location",
            Self::Organization => "Organization",
        }
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EntityLabel {
    type Err = WayangError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "person" => Ok(Self::Person),
            "location" => Ok(Self::Location),
            "organization" => Ok(Self::Organization),
            other => Err(WayangError::Parse(format!("unknown entity label: {other}"))),
        }
    }
}

impl TryFrom<String> for EntityLabel {
    type Error = WayangError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EntityLabel> for String {
    fn from(label: EntityLabel) -> Self {
        label.as_str().to_string()
    }
}

// ============================================================================
// Pipeline Records
// ============================================================================

/// One row of the narrative corpus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusRow {
    /// Story title, used as provenance
    pub title: String,

    /// Optional sub-heading within the story
    pub subtitle: Option<String>,

    /// Narrative text
    pub text: String,
}

impl CorpusRow {
    /// Create a new row without a subtitle
    pub fn new(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            text: text.into(),
        }
    }

    /// Set subtitle
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }
}

/// Persisted form of a canonical entity
///
/// This is the node record handed to the graph importer and read back by
/// the evaluation harness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Display name
    pub name: String,

    /// Entity label
    pub label: EntityLabel,

    /// Best confidence seen for this entity
    pub confidence: f32,

    /// Stories the entity was sighted in, sorted lexically
    pub stories: Vec<String>,
}

impl EntityRecord {
    /// Create a new record with no stories
    pub fn new(name: impl Into<String>, label: EntityLabel, confidence: f32) -> Self {
        Self {
            name: name.into(),
            label,
            confidence,
            stories: Vec::new(),
        }
    }

    /// Add a story
    pub fn with_story(mut self, story: impl Into<String>) -> Self {
        self.stories.push(story.into());
        self.stories.sort();
        self.stories.dedup();
        self
    }
}

/// A relationship between two named entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Subject entity name
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,

    /// Object entity name
    #[serde(default, deserialize_with = "null_as_default")]
    pub target: String,

    /// Relationship type (e.g. `KING_OF`)
    #[serde(
        rename = "type",
        default = "default_relation_type",
        deserialize_with = "null_as_relation_type"
    )]
    pub relation_type: String,

    /// Story the relationship was extracted from
    #[serde(
        default = "default_story_source",
        deserialize_with = "null_as_story_source"
    )]
    pub story_source: String,
}

fn default_relation_type() -> String {
    "RELATED_TO".to_string()
}

fn default_story_source() -> String {
    "Unknown".to_string()
}

// Model replies sometimes carry `null` fields; those fall back to the defaults
fn null_as_default<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn null_as_relation_type<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_relation_type))
}

fn null_as_story_source<'de, D: serde::Deserializer<'de>>(
    d: D,
) -> std::result::Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_else(default_story_source))
}

impl RelationRecord {
    /// Create a new relation
    pub fn new(
        source: impl Into<String>,
        relation_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            story_source: default_story_source(),
        }
    }

    /// Set story source
    pub fn with_story(mut self, story: impl Into<String>) -> Self {
        self.story_source = story.into();
        self
    }

    /// Both endpoints are present
    pub fn has_endpoints(&self) -> bool {
        !self.source.trim().is_empty() && !self.target.trim().is_empty()
    }
}

// ============================================================================
// Record files
// ============================================================================

/// Read a JSON record list from disk
pub fn read_records<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(WayangError::input_missing(path));
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| WayangError::Parse(format!("{}: {e}", path.display())))
}

/// Write a record list to disk as pretty JSON
pub fn write_records<T: Serialize>(path: &std::path::Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(records)
        .map_err(|e| WayangError::Parse(format!("serialize {}: {e}", path.display())))?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Remove a markdown code fence (with optional language tag) from model output
pub fn strip_code_fence(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);

    let body = match rest.split_once('\n') {
        Some((tag, body)) if !tag.trim().contains(' ') => body,
        _ => ["json", "cypher"]
            .iter()
            .find_map(|tag| rest.strip_prefix(tag))
            .unwrap_or(rest),
    };
    body.trim().to_string()
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for generative language model clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for a prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Trait for embedding generation
#[async_trait::async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single query text
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of documents
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

// ============================================================================
// Tests
// ============================================================================
