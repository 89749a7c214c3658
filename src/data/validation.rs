//! Shape validation for species and population payloads
//!
//! Remote responses and the bundled dataset arrive as untyped JSON. A payload
//! is accepted only if it decodes into the typed model and passes the checks
//! serde cannot express (non-blank text, at least one image, positive years).
//! A record that fails any check is rejected wholesale.

use serde_json::Value;
use thiserror::Error;

use super::{PopulationPoint, Species};

/// Reasons a payload was rejected
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A successful response carried no JSON body
    #[error("Response has no JSON body")]
    MissingBody,

    /// Required field missing or of the wrong type
    #[error("Malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required text field is empty or whitespace
    #[error("Field '{0}' is blank")]
    BlankField(&'static str),

    /// Species has no image references
    #[error("Species '{0}' has no images")]
    NoImages(String),

    /// Expected a JSON array
    #[error("Expected a JSON array")]
    NotAnArray,

    /// Population year must be positive
    #[error("Invalid population year: {0}")]
    InvalidYear(u32),

    /// The response described a different species than the one requested
    #[error("Expected species '{expected}', got '{actual}'")]
    IdMismatch { expected: String, actual: String },
}

impl Species {
    /// Checks the invariants serde does not enforce
    pub fn validate(&self) -> Result<(), ValidationError> {
        let text_fields = [
            ("id", &self.id),
            ("name", &self.name),
            ("facts.habitat", &self.facts.habitat),
            ("facts.diet", &self.facts.diet),
            ("facts.temperament", &self.facts.temperament),
        ];
        for (field, value) in text_fields {
            if value.trim().is_empty() {
                return Err(ValidationError::BlankField(field));
            }
        }

        if self.images.is_empty() {
            return Err(ValidationError::NoImages(self.id.clone()));
        }
        if self.images.iter().any(|image| image.trim().is_empty()) {
            return Err(ValidationError::BlankField("images"));
        }

        Ok(())
    }
}

impl PopulationPoint {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.year == 0 {
            return Err(ValidationError::InvalidYear(self.year));
        }
        Ok(())
    }
}

/// Decodes and validates a single species record
pub fn parse_species(value: Value) -> Result<Species, ValidationError> {
    let species: Species = serde_json::from_value(value)?;
    species.validate()?;
    Ok(species)
}

/// Decodes and validates an array of species records
///
/// One bad element rejects the whole array.
pub fn parse_species_list(value: Value) -> Result<Vec<Species>, ValidationError> {
    let Value::Array(items) = value else {
        return Err(ValidationError::NotAnArray);
    };
    items.into_iter().map(parse_species).collect()
}

/// Decodes and validates a population series
pub fn parse_population(value: Value) -> Result<Vec<PopulationPoint>, ValidationError> {
    if !value.is_array() {
        return Err(ValidationError::NotAnArray);
    }
    let points: Vec<PopulationPoint> = serde_json::from_value(value)?;
    for point in &points {
        point.validate()?;
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_species_json() -> Value {
        json!({
            "id": "sea-otter",
            "name": "Sea Otter",
            "status": "endangered",
            "facts": {
                "habitat": "Kelp forests",
                "diet": "Sea urchins",
                "temperament": "Playful"
            },
            "images": ["images/sea-otter-1.webp"]
        })
    }

    #[test]
    fn test_parse_valid_species() {
        let species = parse_species(valid_species_json()).expect("Should parse");
        assert_eq!(species.id, "sea-otter");
        assert_eq!(species.images.len(), 1);
    }

    #[test]
    fn test_parse_species_missing_field() {
        let mut value = valid_species_json();
        value.as_object_mut().unwrap().remove("facts");

        assert!(matches!(parse_species(value), Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn test_parse_species_mistyped_field() {
        let mut value = valid_species_json();
        value["images"] = json!("images/sea-otter-1.webp");

        assert!(matches!(parse_species(value), Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn test_parse_species_blank_name() {
        let mut value = valid_species_json();
        value["name"] = json!("   ");

        match parse_species(value) {
            Err(ValidationError::BlankField(field)) => assert_eq!(field, "name"),
            other => panic!("Expected BlankField error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_species_without_images() {
        let mut value = valid_species_json();
        value["images"] = json!([]);

        assert!(matches!(parse_species(value), Err(ValidationError::NoImages(_))));
    }

    #[test]
    fn test_parse_species_list_rejects_wholesale() {
        let mut bad = valid_species_json();
        bad["status"] = json!("extinct");
        let list = json!([valid_species_json(), bad]);

        assert!(parse_species_list(list).is_err());
    }

    #[test]
    fn test_parse_species_list_requires_array() {
        assert!(matches!(
            parse_species_list(valid_species_json()),
            Err(ValidationError::NotAnArray)
        ));
    }

    #[test]
    fn test_parse_population() {
        let points = parse_population(json!([
            {"year": 2019, "count": 3000},
            {"year": 2020, "count": 0}
        ]))
        .expect("Should parse");

        assert_eq!(points.len(), 2);
        assert_eq!(points[1], PopulationPoint { year: 2020, count: 0 });
    }

    #[test]
    fn test_parse_population_rejects_year_zero() {
        let result = parse_population(json!([{"year": 0, "count": 10}]));
        assert!(matches!(result, Err(ValidationError::InvalidYear(0))));
    }

    #[test]
    fn test_parse_population_rejects_object() {
        let result = parse_population(json!({"year": 2020, "count": 10}));
        assert!(matches!(result, Err(ValidationError::NotAnArray)));
    }

    #[test]
    fn test_parse_population_rejects_fractional_count() {
        let result = parse_population(json!([{"year": 2020, "count": 10.5}]));
        assert!(matches!(result, Err(ValidationError::Malformed(_))));
    }
}
