//! Coverage (gap analysis) report models.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Confidence in a match given how much of the criteria could be evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    /// Derive confidence from coverage percentage and missing criteria count.
    pub fn assess(coverage_percentage: f64, missing_criteria: usize) -> Self {
        if coverage_percentage >= 90.0 && missing_criteria == 0 {
            ConfidenceLevel::VeryHigh
        } else if coverage_percentage >= 80.0 && missing_criteria <= 1 {
            ConfidenceLevel::High
        } else if coverage_percentage >= 70.0 && missing_criteria <= 2 {
            ConfidenceLevel::Medium
        } else if coverage_percentage >= 60.0 && missing_criteria <= 3 {
            ConfidenceLevel::Low
        } else {
            ConfidenceLevel::VeryLow
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceLevel::VeryHigh => "Very High",
            ConfidenceLevel::High => "High",
            ConfidenceLevel::Medium => "Medium",
            ConfidenceLevel::Low => "Low",
            ConfidenceLevel::VeryLow => "Very Low",
        })
    }
}

/// Bucketed time needed to obtain all missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CompletionEstimate {
    #[serde(rename = "Immediate")]
    Immediate,
    #[serde(rename = "Same day")]
    SameDay,
    #[serde(rename = "1-2 days")]
    OneToTwoDays,
    #[serde(rename = "3-7 days")]
    ThreeToSevenDays,
    #[serde(rename = "1-2 weeks")]
    OneToTwoWeeks,
    #[serde(rename = "2+ weeks")]
    OverTwoWeeks,
}

impl CompletionEstimate {
    /// Bucket the longest turnaround, in days.
    pub fn from_days(max_days: f64) -> Self {
        if max_days <= 0.0 {
            CompletionEstimate::Immediate
        } else if max_days < 1.0 {
            CompletionEstimate::SameDay
        } else if max_days < 2.0 {
            CompletionEstimate::OneToTwoDays
        } else if max_days < 7.0 {
            CompletionEstimate::ThreeToSevenDays
        } else if max_days < 14.0 {
            CompletionEstimate::OneToTwoWeeks
        } else {
            CompletionEstimate::OverTwoWeeks
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionEstimate::Immediate => "Immediate",
            CompletionEstimate::SameDay => "Same day",
            CompletionEstimate::OneToTwoDays => "1-2 days",
            CompletionEstimate::ThreeToSevenDays => "3-7 days",
            CompletionEstimate::OneToTwoWeeks => "1-2 weeks",
            CompletionEstimate::OverTwoWeeks => "2+ weeks",
        }
    }
}

impl fmt::Display for CompletionEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gap analysis for one patient/trial pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageReport {
    /// matched / total inclusion criteria, as a percentage
    pub coverage_percentage: f64,
    pub total_criteria: usize,
    pub matched_criteria: usize,
    pub missing_criteria: usize,
    pub failed_criteria: usize,
    /// Missing items by category (field or code of the predicate)
    pub missing_biomarkers: Vec<String>,
    pub missing_lab_tests: Vec<String>,
    pub missing_conditions: Vec<String>,
    pub missing_demographics: Vec<String>,
    pub missing_medications: Vec<String>,
    /// One line per missing item
    pub recommended_actions: Vec<String>,
    /// Urgency-ordered follow-up actions
    pub priority_actions: Vec<String>,
    pub estimated_completion_time: CompletionEstimate,
    pub confidence_level: ConfidenceLevel,
}

impl CoverageReport {
    /// One-line coverage summary.
    pub fn summary(&self) -> String {
        if self.total_criteria == 0 {
            return "No criteria to evaluate".into();
        }

        let mut parts = vec![
            format!("{:.1}% coverage", self.coverage_percentage),
            format!(
                "({}/{} criteria matched)",
                self.matched_criteria, self.total_criteria
            ),
        ];
        if self.missing_criteria > 0 {
            parts.push(format!("{} missing", self.missing_criteria));
        }
        if self.failed_criteria > 0 {
            parts.push(format!("{} failed", self.failed_criteria));
        }
        parts.join(" ")
    }

    pub fn missing_biomarkers_summary(&self) -> String {
        if self.missing_biomarkers.is_empty() {
            "All required biomarkers present".into()
        } else {
            format!("Missing biomarkers: {}", self.missing_biomarkers.join(", "))
        }
    }

    pub fn next_steps_summary(&self) -> String {
        match self.priority_actions.as_slice() {
            [] => "No additional data needed".into(),
            [only] => format!("Next step: {}", only),
            [first, rest @ ..] => format!("Next steps: {} and {} more", first, rest.len()),
        }
    }
}
