//! Evaluation outcome models.

use serde::{Deserialize, Serialize};

use super::{CoverageReport, Predicate};

/// Evidence marker for an observation that could not be found at all.
pub(crate) const NOT_PRESENT_MARKER: &str = "is not present";

/// Result of evaluating one predicate against one patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchOutcome {
    /// Whether the predicate holds
    pub matched: bool,
    /// Human-readable evidence
    pub evidence: String,
    /// True when the patient lacks the data needed to decide
    pub missing_data: bool,
}

impl MatchOutcome {
    pub fn matched(evidence: impl Into<String>) -> Self {
        Self {
            matched: true,
            evidence: evidence.into(),
            missing_data: false,
        }
    }

    pub fn failed(evidence: impl Into<String>) -> Self {
        Self {
            matched: false,
            evidence: evidence.into(),
            missing_data: false,
        }
    }

    pub fn missing(evidence: impl Into<String>) -> Self {
        Self {
            matched: false,
            evidence: evidence.into(),
            missing_data: true,
        }
    }

    /// Matched when `condition` holds, failed otherwise.
    pub fn from_bool(condition: bool, evidence: impl Into<String>) -> Self {
        if condition {
            Self::matched(evidence)
        } else {
            Self::failed(evidence)
        }
    }

    /// Check whether the evidence says the underlying fact was not found.
    pub fn denotes_not_present(&self) -> bool {
        self.evidence.contains(NOT_PRESENT_MARKER)
    }
}

/// A predicate paired with its evaluation outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionResult {
    pub predicate: Predicate,
    pub outcome: MatchOutcome,
}

/// A trial's criteria as handed to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrialCriteria {
    /// Registry identifier (e.g., NCT number)
    pub trial_id: String,
    /// Inclusion and exclusion predicates
    pub predicates: Vec<Predicate>,
}

impl TrialCriteria {
    pub fn new(trial_id: impl Into<String>, predicates: Vec<Predicate>) -> Self {
        Self {
            trial_id: trial_id.into(),
            predicates,
        }
    }
}

/// Outcome of matching one patient against one trial.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TrialMatchResult {
    /// Score at or above the eligibility threshold and no exclusion fired
    pub eligible: bool,
    /// Weighted match score (0.0 - 100.0)
    pub score: f64,
    pub matched_inclusions: Vec<CriterionResult>,
    pub unmatched_inclusions: Vec<CriterionResult>,
    /// Inclusions that could not be decided for lack of data
    pub missing_inclusions: Vec<CriterionResult>,
    pub exclusions_triggered: Vec<CriterionResult>,
    pub total_inclusions: usize,
    pub matched_count: usize,
    /// matched / total inclusions, as a percentage
    pub coverage_percentage: f64,
    /// Grouped human-readable explanation
    pub reasons: Vec<String>,
    /// One data request per missing inclusion
    pub suggested_data: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage_report: Option<CoverageReport>,
}

impl TrialMatchResult {
    /// Check whether an exclusion criterion vetoed this trial.
    pub fn is_excluded(&self) -> bool {
        !self.exclusions_triggered.is_empty()
    }

    pub fn missing_count(&self) -> usize {
        self.missing_inclusions.len()
    }

    pub fn failed_count(&self) -> usize {
        self.unmatched_inclusions.len()
    }
}
