//! Bundled species dataset
//!
//! The fixed set of species shipped inside the binary. It is the last tier
//! the repository falls back to when neither the cache nor the remote API can
//! produce a record. The dataset is parsed and validated once at startup; a
//! dataset that fails validation aborts startup.

use std::collections::HashSet;

use thiserror::Error;

use super::validation::{parse_species_list, ValidationError};
use super::Species;

/// Raw JSON embedded at compile time
const SPECIES_JSON: &str = include_str!("../../data/species.json");

/// Number of records the bundled dataset must contain
pub const BUNDLED_SPECIES_COUNT: usize = 6;

/// Errors that make the bundled dataset unusable
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The embedded text is not JSON
    #[error("Bundled dataset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A record is missing fields or has the wrong shape
    #[error("Bundled dataset contains an invalid record: {0}")]
    InvalidRecord(#[from] ValidationError),

    /// Unexpected number of records
    #[error("Bundled dataset has {actual} records, expected {expected}")]
    WrongCount { expected: usize, actual: usize },

    /// Two records share an identifier
    #[error("Duplicate species id in bundled dataset: {0}")]
    DuplicateId(String),
}

/// Immutable, validated list of bundled species
#[derive(Debug, Clone)]
pub struct BundledDataset {
    species: Vec<Species>,
}

impl BundledDataset {
    /// Loads the dataset embedded in the binary
    pub fn load() -> Result<Self, DatasetError> {
        Self::from_json(SPECIES_JSON, BUNDLED_SPECIES_COUNT)
    }

    /// Parses and validates a dataset from JSON text
    ///
    /// # Arguments
    /// * `json` - A JSON array of species records
    /// * `expected_count` - The exact number of records required
    pub fn from_json(json: &str, expected_count: usize) -> Result<Self, DatasetError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let species = parse_species_list(value)?;

        if species.len() != expected_count {
            return Err(DatasetError::WrongCount {
                expected: expected_count,
                actual: species.len(),
            });
        }

        let mut seen = HashSet::new();
        for record in &species {
            if !seen.insert(record.id.as_str()) {
                return Err(DatasetError::DuplicateId(record.id.clone()));
            }
        }

        Ok(Self { species })
    }

    /// Get a species by its ID (exact, case-sensitive match)
    pub fn get(&self, id: &str) -> Option<&Species> {
        self.species.iter().find(|species| species.id == id)
    }

    /// All bundled species, in dataset order
    pub fn all(&self) -> &[Species] {
        &self.species
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Case-insensitive substring search over name and facts
    ///
    /// A record matches when the query appears anywhere in its name, habitat,
    /// diet, or temperament. Results keep dataset order.
    pub fn search(&self, query: &str) -> Vec<Species> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.species
            .iter()
            .filter(|species| {
                let haystack = format!(
                    "{} {} {} {}",
                    species.name,
                    species.facts.habitat,
                    species.facts.diet,
                    species.facts.temperament
                );
                haystack.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }
}
