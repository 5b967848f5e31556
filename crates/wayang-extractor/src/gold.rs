//! Gold reference set
//!
//! A curated, intentionally partial list of known-correct entities from
//! the Sakri Lahir and Hastimurti Gugur stories.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use wayang_core::{read_records, EntityLabel, Result};

use crate::repair::normalize;

/// A known-correct entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoldEntity {
    pub name: String,
    pub label: EntityLabel,
}

impl GoldEntity {
    pub fn new(name: impl Into<String>, label: EntityLabel) -> Self {
        Self {
            name: name.into(),
            label,
        }
    }

    /// Identity used for lookup
    pub fn key(&self) -> String {
        normalize(&self.name)
    }
}

const PERSONS: &[&str] = &[
    "Prabu Basukesti",
    "Patih Jayaloka",
    "Resi Suganda",
    "Empu Dewayasa",
    "Empu Purbageni",
    "Empu Prawa",
    "Empu Kanomayasa",
    "Dewi Kaniraras",
    "Dewi Marapi",
    "Resi Kuswala",
    "Bambang Daneswara",
    "Prabu Cingkaradewa",
    "Sri Maharaja Purwacandra",
    "Ditya Citradana",
    "Putut Margana",
    "Indramarkata",
    "Kalayaksa",
    "Gajah Barigu",
    "Garuda Urna",
    "Naga Wiswana",
    "Resi Manumanasa",
    "Bambang Satrukem",
    "Dewi Nilawati",
    "Janggan Smara",
    "Prabu Durapati",
    "Prabu Basupati",
    "Prabu Hastimurti",
    "Resi Basunanda",
    "Patih Basundara",
    "Raden Wasanta",
    "Arya Basusara",
    "Prabu Daneswara",
    "Dewi Awanti",
    "Brahmana Wisaka",
    "Prabu Sriwahana",
];

const LOCATIONS: &[&str] = &[
    "Utarakanda",
    "Purwakanda",
    "Daksinakanda",
    "Pracimakanda",
    "Padepokan Saptaarga",
    "Gunung Saptaarga",
    "Tanah Hindustan",
    "Tanah Jawa",
    "Hutan Minangsraya",
    "Medang Kamulan",
];

const ORGANIZATIONS: &[&str] = &[
    "Kerajaan Wirata",
    "Kerajaan Duhyapura",
    "Kerajaan Gajahoya",
    "Kerajaan Medang Kamulan",
    "Gilingwesi",
];

/// Reference set keyed by normalized name, in reference order
#[derive(Debug, Clone, Default)]
pub struct GoldStandard {
    entities: Vec<GoldEntity>,
}

impl GoldStandard {
    /// Build from a list; later duplicates of a normalized name are dropped
    pub fn new(entities: impl IntoIterator<Item = GoldEntity>) -> Self {
        let mut seen = HashSet::new();
        let entities = entities
            .into_iter()
            .filter(|e| seen.insert(e.key()))
            .collect();
        Self { entities }
    }

    /// The built-in wayang reference list
    pub fn builtin() -> Self {
        let persons = PERSONS
            .iter()
            .map(|n| GoldEntity::new(*n, EntityLabel::Person));
        let locations = LOCATIONS
            .iter()
            .map(|n| GoldEntity::new(*n, EntityLabel::Location));
        let organizations = ORGANIZATIONS
            .iter()
            .map(|n| GoldEntity::new(*n, EntityLabel::Organization));

        Self::new(persons.chain(locations).chain(organizations))
    }

    /// Load a `[{name, label}]` JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let entities: Vec<GoldEntity> = read_records(path)?;
        Ok(Self::new(entities))
    }

    /// Load from a file when given, otherwise use the built-in list
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::builtin()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &GoldEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
