//! Patient feature models.
//!
//! `PatientFeatures` is the input contract produced by the feature extraction
//! collaborator. Numeric observation values are expected to already be in
//! standard units.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A terminology coding (SNOMED, LOINC, RxNorm, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Coding {
    /// Code system URI or name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The code itself
    pub code: String,
    /// Human-readable display text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            system: None,
            code: code.into(),
            display: None,
        }
    }
}

/// A condition or medication entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClinicalEntry {
    /// Free-text name as recorded
    pub text: String,
    /// Attached codings
    #[serde(default)]
    pub codes: Vec<Coding>,
    /// Clinical or administrative status (e.g., "active")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl ClinicalEntry {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Attach a coding.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.codes.push(Coding::new(code));
        self
    }

    /// Check whether any attached coding has this exact code.
    pub fn has_code(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c.code == code)
    }

    /// Case-insensitive substring match against the entry text.
    pub fn text_contains(&self, needle_lower: &str) -> bool {
        self.text.to_lowercase().contains(needle_lower)
    }
}

/// A measured value: numeric or categorical.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ObservationValue {
    Number(f64),
    Text(String),
}

impl ObservationValue {
    /// Numeric view. Numeric text is parsed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ObservationValue::Number(n) => Some(*n),
            ObservationValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl std::fmt::Display for ObservationValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObservationValue::Number(n) => write!(f, "{}", n),
            ObservationValue::Text(s) => f.write_str(s),
        }
    }
}

/// A lab result, observation or vital sign.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Observation {
    /// Free-text name (e.g., "Hemoglobin [Mass/volume] in Blood")
    pub text: String,
    /// Attached codings (typically LOINC)
    #[serde(default)]
    pub codes: Vec<Coding>,
    /// Measured value, if recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ObservationValue>,
    /// Unit of the value (standard unit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Observation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.codes.push(Coding::new(code));
        self
    }

    pub fn with_number(mut self, value: f64, unit: Option<&str>) -> Self {
        self.value = Some(ObservationValue::Number(value));
        self.unit = unit.map(Into::into);
        self
    }

    pub fn with_text(mut self, value: impl Into<String>) -> Self {
        self.value = Some(ObservationValue::Text(value.into()));
        self
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.codes.iter().any(|c| c.code == code)
    }
}

/// Normalized clinical features of one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PatientFeatures {
    /// Age in years
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    /// Administrative gender as recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Recorded conditions, in source order
    #[serde(default)]
    pub conditions: Vec<ClinicalEntry>,
    /// General observations
    #[serde(default)]
    pub observations: Vec<Observation>,
    /// Laboratory results
    #[serde(default, alias = "labResults")]
    pub lab_results: Vec<Observation>,
    /// Medications, in source order
    #[serde(default)]
    pub medications: Vec<ClinicalEntry>,
    /// Vital signs keyed by name
    #[serde(default, alias = "vitalSigns")]
    pub vital_signs: BTreeMap<String, Observation>,
}

impl PatientFeatures {
    /// Check whether any fact at all is available for evaluation.
    pub fn has_evaluable_features(&self) -> bool {
        self.age.is_some()
            || self.gender.is_some()
            || !self.conditions.is_empty()
            || !self.observations.is_empty()
            || !self.lab_results.is_empty()
            || !self.medications.is_empty()
            || !self.vital_signs.is_empty()
    }
}
