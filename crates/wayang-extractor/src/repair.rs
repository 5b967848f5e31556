//! Span repair and cleaning
//!
//! Subword models report span boundaries that can split a proper name
//! (`"Arya Bas"` for `"Arya Basusara"`). Repair reads the original text
//! instead of trusting the model's reconstructed token string, then the
//! cleaner turns the result into the canonical display form.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use wayang_core::{EntityLabel, NerConfig};

use crate::{RawSpan, RepairedSpan};

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PUNCT_BEFORE_LETTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.,!?;:])([a-zA-Z])").unwrap());
static OPEN_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\(\s*").unwrap());
static CLOSE_PAREN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\)\s*").unwrap());
static CONTINUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*##").unwrap());
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r" +").unwrap());

/// Characters stripped from both ends of an entity name
const EDGE_PUNCTUATION: &[char] = &[' ', '.', ',', ':', ';', '!', '?', '"', '\'', '(', ')'];

// ============================================================================
// Text utilities
// ============================================================================

/// Normalize corpus text before it is sent to the labeling model
pub fn preprocess_text(raw: &str) -> String {
    let text = WHITESPACE_RUN.replace_all(raw, " ");
    let text = PUNCT_BEFORE_LETTER.replace_all(&text, "$1 $2");
    let text = OPEN_PAREN.replace_all(&text, " (");
    let text = CLOSE_PAREN.replace_all(&text, ") ");
    text.trim().to_string()
}

/// Extend a span so it does not stop in the middle of a word
///
/// Offsets are character offsets clamped to the text. When `end` is already
/// at or past the end of the text the slice is returned unchanged. A start
/// past the repaired end yields an empty string.
pub fn expand_to_full_word(text: &str, start: usize, end: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let start = start.min(len);
    let end = end.min(len);

    let mut repaired_end = end;
    while repaired_end < len && chars[repaired_end].is_alphanumeric() {
        repaired_end += 1;
    }

    if start >= repaired_end {
        return String::new();
    }
    chars[start..repaired_end].iter().collect()
}

impl RepairedSpan {
    /// Read a raw span back out of the text, extended to a word boundary
    pub fn repair(text: &str, span: &RawSpan) -> Self {
        Self {
            text: expand_to_full_word(text, span.start, span.end),
            group: span.group,
            confidence: span.confidence,
        }
    }
}

/// Canonical display form of a raw entity string
pub fn clean_entity_name(raw: &str) -> String {
    let joined = CONTINUATION.replace_all(raw, "");
    let trimmed = joined.trim_matches(EDGE_PUNCTUATION);
    SPACE_RUN.replace_all(trimmed, " ").into_owned()
}

/// Dedup identity of an entity name
pub fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// Span filter
// ============================================================================

/// Reason a labeled span did not become an entity sighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpanRejection {
    /// Confidence below the configured threshold
    LowConfidence,
    /// Cleaned text too short to be a name
    TooShort,
    /// Cleaned text is a function word or bare title
    Blocklisted,
    /// Label group has no canonical label
    UnsupportedGroup,
}

impl SpanRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LowConfidence => "low_confidence",
            Self::TooShort => "too_short",
            Self::Blocklisted => "blocklisted",
            Self::UnsupportedGroup => "unsupported_group",
        }
    }
}

impl std::fmt::Display for SpanRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Accepted span: cleaned display name plus its label
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedSpan {
    pub name: String,
    pub label: EntityLabel,
    pub confidence: f32,
}

/// Repairs, cleans, and filters raw spans
#[derive(Debug, Clone)]
pub struct SpanFilter {
    confidence_threshold: f32,
    min_chars: usize,
    blocklist: HashSet<String>,
}

impl SpanFilter {
    /// Create a filter with the given threshold and default length/blocklist
    pub fn new(confidence_threshold: f32) -> Self {
        Self::from_config(&NerConfig::default()).with_threshold(confidence_threshold)
    }

    /// Create from config
    pub fn from_config(config: &NerConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            min_chars: config.min_entity_chars,
            blocklist: config.blocklist.iter().cloned().collect(),
        }
    }

    /// Set confidence threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Run one span through threshold, repair, cleaning, and junk checks
    pub fn accept(&self, text: &str, span: &RawSpan) -> Result<AcceptedSpan, SpanRejection> {
        if span.confidence < self.confidence_threshold {
            return Err(SpanRejection::LowConfidence);
        }
        self.clean(RepairedSpan::repair(text, span))
    }

    /// Clean a repaired span and apply the length and blocklist checks
    pub fn clean(&self, span: RepairedSpan) -> Result<AcceptedSpan, SpanRejection> {
        let name = clean_entity_name(&span.text);

        if name.chars().count() < self.min_chars {
            return Err(SpanRejection::TooShort);
        }
        // A bare title like "Sang" is junk, "Sang Hyang Wenang" is not
        if self.blocklist.contains(&name) {
            return Err(SpanRejection::Blocklisted);
        }

        let label = span.group.label().ok_or(SpanRejection::UnsupportedGroup)?;

        Ok(AcceptedSpan {
            name,
            label,
            confidence: span.confidence,
        })
    }
}

impl Default for SpanFilter {
    fn default() -> Self {
        Self::from_config(&NerConfig::default())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelGroup;
    use proptest::prelude::*;

    #[test]
    fn test_expand_repairs_cut_name() {
        assert_eq!(
            expand_to_full_word("Arya Basusara adalah", 0, 8),
            "Arya Basusara"
        );
    }

    #[test]
    fn test_expand_stops_at_punctuation() {
        assert_eq!(expand_to_full_word("Resi Sug, lalu", 0, 7), "Resi Sug");
        assert_eq!(expand_to_full_word("Dewi Kaniraras.", 0, 8), "Dewi Kaniraras");
    }

    #[test]
    fn test_expand_at_text_end() {
        let text = "Prabu Basukesti";
        assert_eq!(expand_to_full_word(text, 6, text.len()), "Basukesti");
        assert_eq!(expand_to_full_word(text, 6, 99), "Basukesti");
    }

    #[test]
    fn test_expand_keeps_start_when_offsets_reversed() {
        assert_eq!(expand_to_full_word("abcdefgh xy", 5, 3), "fgh");
        assert_eq!(expand_to_full_word("abcdefgh xy", 10, 9), "");
        assert_eq!(expand_to_full_word("abc", 7, 9), "");
    }

    #[test]
    fn test_repaired_span_reads_original_text() {
        let text = "Arya Basusara adalah putra";
        let repaired = RepairedSpan::repair(text, &RawSpan::new(0, 8, LabelGroup::Person, 0.7));
        assert_eq!(repaired.text, "Arya Basusara");
        assert_eq!(repaired.group, LabelGroup::Person);
        assert!((repaired.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clean_skips_threshold() {
        let filter = SpanFilter::default();
        let span = RepairedSpan {
            text: "##Wirata.".to_string(),
            group: LabelGroup::Location,
            confidence: 0.1,
        };
        let accepted = filter.clean(span).unwrap();
        assert_eq!(accepted.name, "Wirata");
        assert_eq!(accepted.label, EntityLabel::Location);
    }

    #[test]
    fn test_expand_counts_characters_not_bytes() {
        let text = "Dewi Ñawati pergi";
        assert_eq!(expand_to_full_word(text, 5, 7), "Ñawati");
    }

    #[test]
    fn test_clean_joins_continuation_markers() {
        assert_eq!(clean_entity_name("Bam ##bang"), "Bambang");
        assert_eq!(clean_entity_name("Bam##bang Dane##swara"), "Bambang Daneswara");
    }

    #[test]
    fn test_clean_strips_edge_punctuation() {
        assert_eq!(clean_entity_name("(\"Prabu  Basukesti\"),"), "Prabu Basukesti");
        assert_eq!(clean_entity_name("'Wirata.'"), "Wirata");
    }

    #[test]
    fn test_preprocess_text() {
        assert_eq!(
            preprocess_text("  Prabu Basukesti\n\tberkata.Lalu   ia pergi(ke hutan)dan"),
            "Prabu Basukesti berkata. Lalu ia pergi (ke hutan) dan"
        );
    }

    #[test]
    fn test_filter_rejections() {
        let filter = SpanFilter::default();
        let text = "Sang Prabu Basukesti di Wirata";

        let low = RawSpan::new(5, 20, LabelGroup::Person, 0.59);
        assert_eq!(filter.accept(text, &low), Err(SpanRejection::LowConfidence));

        let short = RawSpan::new(21, 23, LabelGroup::Person, 0.9);
        assert_eq!(filter.accept(text, &short), Err(SpanRejection::TooShort));

        let title = RawSpan::new(0, 4, LabelGroup::Person, 0.9);
        assert_eq!(filter.accept(text, &title), Err(SpanRejection::Blocklisted));

        let misc = RawSpan::new(24, 30, LabelGroup::Other, 0.9);
        assert_eq!(
            filter.accept(text, &misc),
            Err(SpanRejection::UnsupportedGroup)
        );
    }

    #[test]
    fn test_filter_accepts_repaired_name() {
        let filter = SpanFilter::default();
        let text = "Arya Basusara adalah putra";
        let span = RawSpan::new(0, 8, LabelGroup::Person, 0.61);

        let accepted = filter.accept(text, &span).unwrap();
        assert_eq!(accepted.name, "Arya Basusara");
        assert_eq!(accepted.label, EntityLabel::Person);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let filter = SpanFilter::new(0.6);
        let span = RawSpan::new(0, 6, LabelGroup::Location, 0.6);
        assert!(filter.accept("Wirata", &span).is_ok());
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(s in any::<String>()) {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_expand_at_end_is_noop(text in "[A-Za-z ,.]{0,40}", start in 0usize..50) {
            let len = text.chars().count();
            let start = start.min(len);
            let expected: String = text.chars().skip(start).collect();
            prop_assert_eq!(expand_to_full_word(&text, start, len), expected);
        }

        #[test]
        fn prop_expand_never_shrinks(text in "[A-Za-z ,.]{1,40}", a in 0usize..40, b in 0usize..40) {
            let len = text.chars().count();
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            let (start, end) = (start.min(len), end.min(len));
            let expanded = expand_to_full_word(&text, start, end);
            prop_assert!(expanded.chars().count() >= end - start);
        }
    }
}
