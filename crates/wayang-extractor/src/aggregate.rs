//! Entity aggregation
//!
//! Deduplicates accepted spans across a whole corpus pass into one
//! canonical entity per normalized name.

use std::collections::{BTreeSet, HashMap};

use wayang_core::{EntityLabel, EntityRecord};

use crate::repair::{normalize, AcceptedSpan};

/// One sighting of an entity in a document
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    /// Cleaned display name
    pub name: String,
    pub label: EntityLabel,
    pub confidence: f32,
    /// Document (story) the sighting came from
    pub document_id: String,
}

impl Sighting {
    pub fn new(
        name: impl Into<String>,
        label: EntityLabel,
        confidence: f32,
        document_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label,
            confidence,
            document_id: document_id.into(),
        }
    }

    /// Build a sighting from a filtered span
    pub fn from_span(span: AcceptedSpan, document_id: impl Into<String>) -> Self {
        Self {
            name: span.name,
            label: span.label,
            confidence: span.confidence,
            document_id: document_id.into(),
        }
    }
}

/// Deduplicated entity
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalEntity {
    /// Lowercased, trimmed name; identity across merges
    pub key: String,
    /// Display name from the first sighting
    pub display_name: String,
    /// Label from the first sighting
    pub label: EntityLabel,
    /// Highest confidence seen
    pub confidence: f32,
    /// Documents the entity was sighted in
    pub sources: BTreeSet<String>,
}

impl CanonicalEntity {
    fn first_sighting(key: String, sighting: Sighting) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(sighting.document_id);
        Self {
            key,
            display_name: sighting.name,
            label: sighting.label,
            confidence: sighting.confidence,
            sources,
        }
    }

    fn merge(&mut self, sighting: Sighting) {
        // Later labels are ignored; conflicts only surface in evaluation
        if sighting.confidence > self.confidence {
            self.confidence = sighting.confidence;
        }
        self.sources.insert(sighting.document_id);
    }

    /// Persisted form
    pub fn to_record(&self) -> EntityRecord {
        EntityRecord {
            name: self.display_name.clone(),
            label: self.label,
            confidence: self.confidence,
            stories: self.sources.iter().cloned().collect(),
        }
    }
}

/// Accumulates sightings into a canonical entity table
#[derive(Debug, Default)]
pub struct EntityAggregator {
    entities: HashMap<String, CanonicalEntity>,
}

impl EntityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sighting; returns true when it created a new entity
    pub fn observe(&mut self, sighting: Sighting) -> bool {
        let key = normalize(&sighting.name);
        match self.entities.get_mut(&key) {
            Some(existing) => {
                existing.merge(sighting);
                false
            }
            None => {
                self.entities
                    .insert(key.clone(), CanonicalEntity::first_sighting(key, sighting));
                true
            }
        }
    }

    /// Look up an entity by any spelling of its name
    pub fn get(&self, name: &str) -> Option<&CanonicalEntity> {
        self.entities.get(&normalize(name))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Final table sorted by display name
    pub fn into_table(self) -> Vec<CanonicalEntity> {
        let mut table: Vec<CanonicalEntity> = self.entities.into_values().collect();
        table.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.key.cmp(&b.key))
        });
        table
    }

    /// Final table as persisted records
    pub fn into_records(self) -> Vec<EntityRecord> {
        self.into_table().iter().map(CanonicalEntity::to_record).collect()
    }
}

impl Extend<Sighting> for EntityAggregator {
    fn extend<I: IntoIterator<Item = Sighting>>(&mut self, iter: I) {
        for sighting in iter {
            self.observe(sighting);
        }
    }
}

impl FromIterator<Sighting> for EntityAggregator {
    fn from_iter<I: IntoIterator<Item = Sighting>>(iter: I) -> Self {
        let mut aggregator = Self::new();
        aggregator.extend(iter);
        aggregator
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_first_label_wins() {
        let mut agg = EntityAggregator::new();
        assert!(agg.observe(Sighting::new(
            "Medang Kamulan",
            EntityLabel::Location,
            0.7,
            "Sakri Lahir"
        )));
        assert!(!agg.observe(Sighting::new(
            "medang kamulan",
            EntityLabel::Organization,
            0.95,
            "Hastimurti Gugur"
        )));

        let entity = agg.get("MEDANG KAMULAN").unwrap();
        assert_eq!(entity.label, EntityLabel::Location);
        assert_eq!(entity.display_name, "Medang Kamulan");
        assert!((entity.confidence - 0.95).abs() < f32::EPSILON);
        assert_eq!(entity.sources.len(), 2);
    }

    #[test]
    fn test_aliases_stay_distinct() {
        let agg: EntityAggregator = vec![
            Sighting::new("Basukesti", EntityLabel::Person, 0.8, "a"),
            Sighting::new("Prabu Basukesti", EntityLabel::Person, 0.9, "a"),
        ]
        .into_iter()
        .collect();

        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn test_records_sorted_with_sorted_stories() {
        let agg: EntityAggregator = vec![
            Sighting::new("Wirata", EntityLabel::Location, 0.8, "Zeta"),
            Sighting::new("Arya Basusara", EntityLabel::Person, 0.61, "Beta"),
            Sighting::new("Wirata", EntityLabel::Location, 0.7, "Alpha"),
            Sighting::new("Wirata", EntityLabel::Location, 0.7, "Alpha"),
        ]
        .into_iter()
        .collect();

        let records = agg.into_records();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Arya Basusara", "Wirata"]);
        assert_eq!(records[1].stories, vec!["Alpha", "Zeta"]);
        assert!((records[1].confidence - 0.8).abs() < f32::EPSILON);
    }

    fn sighting_strategy() -> impl Strategy<Value = Sighting> {
        (
            prop::sample::select(vec!["Wirata", "wirata", " WIRATA ", "Resi Suganda", "Gilingwesi"]),
            0.0f32..1.0,
            prop::sample::select(vec!["a", "b", "c"]),
        )
            .prop_map(|(name, conf, doc)| Sighting::new(name, EntityLabel::Person, conf, doc))
    }

    proptest! {
        #[test]
        fn prop_keys_unique(sightings in prop::collection::vec(sighting_strategy(), 0..40)) {
            let table = sightings.into_iter().collect::<EntityAggregator>().into_table();
            let keys: HashSet<&str> = table.iter().map(|e| e.key.as_str()).collect();
            prop_assert_eq!(keys.len(), table.len());
        }

        #[test]
        fn prop_confidence_is_max(sightings in prop::collection::vec(sighting_strategy(), 1..40)) {
            let mut expected: HashMap<String, f32> = HashMap::new();
            for s in &sightings {
                let entry = expected.entry(normalize(&s.name)).or_insert(f32::MIN);
                *entry = entry.max(s.confidence);
            }

            let agg: EntityAggregator = sightings.into_iter().collect();
            for (key, max) in expected {
                let entity = agg.get(&key).unwrap();
                prop_assert_eq!(entity.confidence, max);
            }
        }
    }
}
