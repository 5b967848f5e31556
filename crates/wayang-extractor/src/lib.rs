//! Wayang Extractor - Knowledge extraction pipeline
//!
//! Turns token-classification output into a deduplicated entity table,
//! scores that table against a partial gold reference, and extracts
//! relationships between the resulting entities.

use wayang_core::{EntityLabel, Result};

/// Coarse entity category reported by the labeling model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelGroup {
    Person,
    Organization,
    Location,
    Other,
}

impl LabelGroup {
    /// Parse a model entity group tag
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_uppercase().as_str() {
            "PER" => Self::Person,
            "ORG" => Self::Organization,
            "LOC" => Self::Location,
            _ => Self::Other,
        }
    }

    /// Canonical label for this group, if it has one
    pub fn label(&self) -> Option<EntityLabel> {
        match self {
            Self::Person => Some(EntityLabel::Person),
            Self::Organization => Some(EntityLabel::Organization),
            Self::Location => Some(EntityLabel::Location),
            Self::Other => None,
        }
    }
}

/// Span reported by the labeling model
///
/// Offsets are character offsets into the text the model was given.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSpan {
    pub start: usize,
    pub end: usize,
    pub group: LabelGroup,
    pub confidence: f32,
}

impl RawSpan {
    pub fn new(start: usize, end: usize, group: LabelGroup, confidence: f32) -> Self {
        Self {
            start,
            end,
            group,
            confidence,
        }
    }
}

/// Span extended so it does not end mid-word
#[derive(Debug, Clone, PartialEq)]
pub struct RepairedSpan {
    pub text: String,
    pub group: LabelGroup,
    pub confidence: f32,
}

/// Trait for span-labeling models
#[async_trait::async_trait]
pub trait SpanLabeler: Send + Sync {
    /// Label entity spans in one preprocessed text
    async fn label(&self, text: &str) -> Result<Vec<RawSpan>>;
}

pub mod aggregate;
pub mod corpus;
pub mod gold;
pub mod labeler;
pub mod metrics;
pub mod pipeline;
pub mod rate;
pub mod relation;
pub mod repair;

pub use aggregate::{CanonicalEntity, EntityAggregator, Sighting};
pub use corpus::CorpusReader;
pub use gold::{GoldEntity, GoldStandard};
pub use labeler::HttpSpanLabeler;
pub use metrics::{EvaluationReport, Evaluator, LabelMismatch};
pub use pipeline::{NerPipeline, PipelineRun, PipelineStats, RowOutcome};
pub use rate::{IntervalGate, RateGate, Unthrottled};
pub use relation::{
    parse_relations, valid_entity_names, RelationExtractor, RelationOutcome, RelationRun,
    RelationStats, RelationType,
};
pub use repair::{SpanFilter, SpanRejection};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_group_from_tag() {
        assert_eq!(LabelGroup::from_tag("PER"), LabelGroup::Person);
        assert_eq!(LabelGroup::from_tag("loc"), LabelGroup::Location);
        assert_eq!(LabelGroup::from_tag("MISC"), LabelGroup::Other);
        assert_eq!(LabelGroup::Other.label(), None);
        assert_eq!(LabelGroup::Organization.label(), Some(EntityLabel::Organization));
    }
}
