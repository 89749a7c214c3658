//! Core data models for Sea Here
//!
//! This module contains the data types used throughout the application for
//! representing sea creature species and their population series, along with
//! the bundled dataset, payload validation, and the remote API client.

pub mod bundled;
pub mod client;
pub mod validation;

pub use bundled::{BundledDataset, DatasetError, BUNDLED_SPECIES_COUNT};
pub use client::{ApiError, ApiResponse, HttpTransport, OfflineTransport, Transport};
pub use validation::{parse_population, parse_species, parse_species_list, ValidationError};

use std::fmt;

use serde::{Deserialize, Serialize};

/// A sea creature shown on a fact card
///
/// The identifier never changes once a record exists; every other field is
/// replaced wholesale when a newer record arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Species {
    /// Unique identifier (e.g., "sea-otter")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// IUCN Red List category
    pub status: ConservationStatus,
    /// The three short facts shown on the card
    pub facts: SpeciesFacts,
    /// Image references, in display order. Never empty.
    pub images: Vec<String>,
}

/// Descriptive facts for a species
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesFacts {
    pub habitat: String,
    pub diet: String,
    pub temperament: String,
}

/// Conservation status, ordered from least to most threatened
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConservationStatus {
    #[serde(alias = "LC")]
    LeastConcern,
    #[serde(alias = "NT")]
    NearThreatened,
    #[serde(alias = "VU")]
    Vulnerable,
    #[serde(alias = "EN")]
    Endangered,
    #[serde(alias = "CR")]
    CriticallyEndangered,
}

impl ConservationStatus {
    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ConservationStatus::LeastConcern => "Least Concern",
            ConservationStatus::NearThreatened => "Near Threatened",
            ConservationStatus::Vulnerable => "Vulnerable",
            ConservationStatus::Endangered => "Endangered",
            ConservationStatus::CriticallyEndangered => "Critically Endangered",
        }
    }
}

impl fmt::Display for ConservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One year of a species' population series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationPoint {
    /// Calendar year, always positive
    pub year: u32,
    /// Estimated number of individuals
    pub count: u64,
}
