//! Relation Extraction (RE) module
//!
//! Asks a generative model for typed edges between entities that the
//! extraction pass already found. The entity list constrains the prompt so
//! edge endpoints line up with graph node names.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use wayang_core::{
    strip_code_fence, CorpusRow, EntityRecord, LlmClient, RelationRecord, RelationsConfig, Result,
    WayangError,
};

use crate::rate::RateGate;

// ============================================================================
// Relation Types
// ============================================================================

/// Relation types the model may emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    // Kinship
    FatherOf,
    MotherOf,
    SonOf,
    DaughterOf,
    SiblingOf,
    MarriedTo,

    // Conflict and alliance
    KilledBy,
    AllyOf,
    EnemyOf,

    // Rule
    KingOf,
    LeaderOf,

    // Person -> Location / Weapon
    LocatedIn,
    UsesWeapon,

    // Teaching
    MentorOf,
    StudentOf,
}

impl RelationType {
    pub const ALL: [RelationType; 15] = [
        Self::FatherOf,
        Self::MotherOf,
        Self::SonOf,
        Self::DaughterOf,
        Self::SiblingOf,
        Self::MarriedTo,
        Self::KilledBy,
        Self::AllyOf,
        Self::EnemyOf,
        Self::KingOf,
        Self::LeaderOf,
        Self::LocatedIn,
        Self::UsesWeapon,
        Self::MentorOf,
        Self::StudentOf,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FatherOf => "FATHER_OF",
            Self::MotherOf => "MOTHER_OF",
            Self::SonOf => "SON_OF",
            Self::DaughterOf => "DAUGHTER_OF",
            Self::SiblingOf => "SIBLING_OF",
            Self::MarriedTo => "MARRIED_TO",
            Self::KilledBy => "KILLED_BY",
            Self::AllyOf => "ALLY_OF",
            Self::EnemyOf => "ENEMY_OF",
            Self::KingOf => "KING_OF",
            Self::LeaderOf => "LEADER_OF",
            Self::LocatedIn => "LOCATED_IN",
            Self::UsesWeapon => "USES_WEAPON",
            Self::MentorOf => "MENTOR_OF",
            Self::StudentOf => "STUDENT_OF",
        }
    }

    /// Get from string, tolerating case and spaces
    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_uppercase().replace(' ', "_");
        Self::ALL.iter().copied().find(|t| t.as_str() == wanted)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// LLM-based RE
// ============================================================================

/// Outcome of extracting relations from one row
#[derive(Debug)]
pub enum RelationOutcome {
    Extracted(Vec<RelationRecord>),
    /// Text too short to be worth a model call
    TooShort,
    Failed(WayangError),
}

/// Counters for one relation extraction run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationStats {
    pub rows_seen: usize,
    pub rows_extracted: usize,
    pub rows_too_short: usize,
    pub rows_failed: usize,
}

/// Result of a relation extraction run
#[derive(Debug, Default)]
pub struct RelationRun {
    pub relations: Vec<RelationRecord>,
    pub stats: RelationStats,
}

/// Entity names that may appear as edge endpoints
pub fn valid_entity_names(records: &[EntityRecord], min_confidence: f32) -> Vec<String> {
    records
        .iter()
        .filter(|r| r.confidence > min_confidence)
        .map(|r| r.name.clone())
        .collect()
}

/// Parse a model reply into relation records
pub fn parse_relations(raw: &str) -> Result<Vec<RelationRecord>> {
    let body = strip_code_fence(raw);
    serde_json::from_str(&body).map_err(|e| WayangError::Parse(format!("relation list: {e}")))
}

/// LLM-driven relation extractor
pub struct RelationExtractor {
    llm: Arc<dyn LlmClient>,
    gate: Arc<dyn RateGate>,
    valid_entities: Vec<String>,
    min_text_chars: usize,
}

impl RelationExtractor {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        gate: Arc<dyn RateGate>,
        valid_entities: Vec<String>,
        config: &RelationsConfig,
    ) -> Self {
        Self {
            llm,
            gate,
            valid_entities,
            min_text_chars: config.min_text_chars,
        }
    }

    /// Build the extraction prompt
    pub fn build_prompt(&self, text: &str) -> String {
        let entities = self.valid_entities.join(", ");
        let relation_types: Vec<&str> = RelationType::ALL.iter().map(|t| t.as_str()).collect();

        format!(
            "You are a graph database expert for wayang stories.\n\n\
             Task: extract relationships from the STORY TEXT below.\n\n\
             Constraint: use ONLY entity names from this VALID ENTITY LIST:\n\
             [{entities}]\n\n\
             If a name in the text (like \"Basukesti\") matches a name in the list \
             (like \"Prabu Basukesti\"), use the list name. Ignore entities that are not in the list.\n\n\
             Allowed relationship types: {}\n\
             (LOCATED_IN is Person -> Location, USES_WEAPON is Person -> Weapon)\n\n\
             Format: return ONLY a JSON list of objects, without markdown code blocks. Example:\n\
             [{{\"source\": \"Prabu Basukesti\", \"target\": \"Kerajaan Wirata\", \"type\": \"KING_OF\"}}]\n\n\
             STORY TEXT:\n{text}",
            relation_types.join(", ")
        )
    }

    /// Extract relations from one row
    pub async fn extract_row(&self, row: &CorpusRow) -> RelationOutcome {
        if row.text.chars().count() < self.min_text_chars {
            return RelationOutcome::TooShort;
        }

        self.gate.acquire().await;

        let prompt = self.build_prompt(&row.text);
        let reply = match self.llm.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => return RelationOutcome::Failed(e),
        };

        match parse_relations(&reply) {
            Ok(relations) => RelationOutcome::Extracted(
                relations
                    .into_iter()
                    .map(|r| r.with_story(row.title.clone()))
                    .collect(),
            ),
            Err(e) => RelationOutcome::Failed(e),
        }
    }

    /// Extract relations from every row in order, skipping failed rows
    pub async fn run<I>(&self, rows: I) -> RelationRun
    where
        I: IntoIterator<Item = CorpusRow>,
    {
        let mut run = RelationRun::default();

        for (index, row) in rows.into_iter().enumerate() {
            run.stats.rows_seen += 1;
            match self.extract_row(&row).await {
                RelationOutcome::Extracted(relations) => {
                    tracing::info!(row = index, title = %row.title, found = relations.len(), "relations extracted");
                    run.stats.rows_extracted += 1;
                    run.relations.extend(relations);
                }
                RelationOutcome::TooShort => run.stats.rows_too_short += 1,
                RelationOutcome::Failed(error) => {
                    tracing::warn!(row = index, title = %row.title, %error, "skipped row");
                    run.stats.rows_failed += 1;
                }
            }
        }

        run
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::Unthrottled;
    use std::sync::Mutex;
    use wayang_core::EntityLabel;

    struct ScriptedLlm {
        replies: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.replies.lock().unwrap().remove(0)
        }
    }

    fn long_text(prefix: &str) -> String {
        format!("{prefix} bertahta di Kerajaan Wirata dan memerintah dengan bijaksana.")
    }

    #[test]
    fn test_relation_type_parse() {
        assert_eq!(RelationType::parse("king of"), Some(RelationType::KingOf));
        assert_eq!(RelationType::parse("SON_OF"), Some(RelationType::SonOf));
        assert_eq!(RelationType::parse("SIBILING_OF"), None);
        assert_eq!(RelationType::KilledBy.to_string(), "KILLED_BY");
    }

    #[test]
    fn test_valid_entity_names() {
        let records = vec![
            EntityRecord::new("Prabu Basukesti", EntityLabel::Person, 0.9),
            EntityRecord::new("Hal", EntityLabel::Person, 0.6),
        ];
        assert_eq!(valid_entity_names(&records, 0.6), vec!["Prabu Basukesti"]);
    }

    #[test]
    fn test_parse_relations_with_fence() {
        let raw = "```json\n[{\"source\":\"Bambang Sakri\",\"target\":\"Bambang Satrukem\",\"type\":\"SON_OF\"}]\n```";
        let relations = parse_relations(raw).unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].relation_type, "SON_OF");
    }

    #[test]
    fn test_parse_relations_keeps_list_with_null_endpoint() {
        let raw = r#"[
            {"source": null, "target": "Kerajaan Wirata", "type": "KING_OF"},
            {"source": "Bambang Sakri", "target": "Bambang Satrukem", "type": "SON_OF"}
        ]"#;
        let relations = parse_relations(raw).unwrap();
        assert_eq!(relations.len(), 2);
        assert!(!relations[0].has_endpoints());
        assert!(relations[1].has_endpoints());
    }

    #[test]
    fn test_prompt_lists_entities() {
        let extractor = RelationExtractor::new(
            Arc::new(ScriptedLlm::new(vec![])),
            Arc::new(Unthrottled::new()),
            vec!["Prabu Basukesti".to_string(), "Kerajaan Wirata".to_string()],
            &RelationsConfig::default(),
        );
        let prompt = extractor.build_prompt("Basukesti bertahta.");
        assert!(prompt.contains("[Prabu Basukesti, Kerajaan Wirata]"));
        assert!(prompt.contains("MENTOR_OF"));
        assert!(prompt.ends_with("Basukesti bertahta."));
    }

    #[tokio::test]
    async fn test_run_skips_failed_and_short_rows() {
        let llm = ScriptedLlm::new(vec![
            Ok(r#"[{"source":"Prabu Basukesti","target":"Kerajaan Wirata","type":"KING_OF"}]"#.to_string()),
            Err(WayangError::Llm("quota exceeded".to_string())),
            Ok("not json".to_string()),
        ]);
        let gate = Arc::new(Unthrottled::new());
        let extractor = RelationExtractor::new(
            Arc::new(llm),
            gate.clone(),
            vec!["Prabu Basukesti".to_string()],
            &RelationsConfig::default(),
        );

        let rows = vec![
            CorpusRow::new("Sakri Lahir", long_text("Prabu Basukesti")),
            CorpusRow::new("Sakri Lahir", "pendek"),
            CorpusRow::new("Hastimurti Gugur", long_text("Prabu Hastimurti")),
            CorpusRow::new("Hastimurti Gugur", long_text("Resi Suganda")),
        ];

        let run = extractor.run(rows).await;

        assert_eq!(run.relations.len(), 1);
        assert_eq!(run.relations[0].story_source, "Sakri Lahir");
        assert_eq!(run.stats.rows_seen, 4);
        assert_eq!(run.stats.rows_too_short, 1);
        assert_eq!(run.stats.rows_failed, 2);
        assert_eq!(gate.acquired(), 3);
    }
}
