//! Coverage report generation.
//!
//! Pipeline: Missing inclusions → Categorization → Recommended actions
//! → Priority actions → Completion estimate → Confidence

mod catalog;

pub use catalog::*;

use tracing::debug;

use crate::models::{
    CompletionEstimate, ConfidenceLevel, CoverageReport, PatientFeatures, ResourceType,
    TrialMatchResult,
};

/// Missing items grouped by category.
#[derive(Debug, Default)]
struct MissingItems {
    biomarkers: Vec<String>,
    lab_tests: Vec<String>,
    conditions: Vec<String>,
    demographics: Vec<String>,
    medications: Vec<String>,
}

/// Builds gap-analysis reports from match results.
#[derive(Debug, Clone, Default)]
pub struct CoverageReportGenerator {
    catalog: GapCatalog,
}

impl CoverageReportGenerator {
    /// Create a generator with the default catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator with a custom catalog.
    pub fn with_catalog(catalog: GapCatalog) -> Self {
        Self { catalog }
    }

    /// Get the catalog for direct access.
    pub fn catalog(&self) -> &GapCatalog {
        &self.catalog
    }

    /// Generate the coverage report for one patient/trial pair.
    pub fn generate(&self, features: &PatientFeatures, result: &TrialMatchResult, trial_id: &str) -> CoverageReport {
        let total = result.total_inclusions;
        let matched = result.matched_count;
        let coverage_percentage = if total == 0 {
            0.0
        } else {
            matched as f64 / total as f64 * 100.0
        };
        let missing_criteria = result.missing_count();

        let items = self.categorize(result);
        let recommended_actions = self.recommended_actions(&items);
        let priority_actions = self.priority_actions(&items);
        let estimated_completion_time = CompletionEstimate::from_days(self.longest_turnaround_days(&items));
        let confidence_level = ConfidenceLevel::assess(coverage_percentage, missing_criteria);

        debug!(
            trial_id,
            coverage_percentage,
            missing_criteria,
            has_patient_facts = features.has_evaluable_features(),
            completion = %estimated_completion_time,
            confidence = %confidence_level,
            "coverage report generated"
        );

        CoverageReport {
            coverage_percentage,
            total_criteria: total,
            matched_criteria: matched,
            missing_criteria,
            failed_criteria: result.failed_count(),
            missing_biomarkers: items.biomarkers,
            missing_lab_tests: items.lab_tests,
            missing_conditions: items.conditions,
            missing_demographics: items.demographics,
            missing_medications: items.medications,
            recommended_actions,
            priority_actions,
            estimated_completion_time,
            confidence_level,
        }
    }

    fn categorize(&self, result: &TrialMatchResult) -> MissingItems {
        let mut items = MissingItems::default();

        for missing in &result.missing_inclusions {
            let name = missing.predicate.label().to_string();
            let bucket = match missing.predicate.resource_type() {
                ResourceType::Observation if self.catalog.is_biomarker(&name) => &mut items.biomarkers,
                ResourceType::Observation => &mut items.lab_tests,
                ResourceType::Condition => &mut items.conditions,
                ResourceType::Patient => &mut items.demographics,
                ResourceType::Medication => &mut items.medications,
            };
            bucket.push(name);
        }

        items
    }

    fn recommended_actions(&self, items: &MissingItems) -> Vec<String> {
        let mut actions = Vec::new();

        for name in &items.biomarkers {
            actions.push(match self.catalog.biomarker(name) {
                Some(info) => order_line(info),
                None => format!("Order {} testing", name),
            });
        }

        for name in &items.lab_tests {
            actions.push(match self.catalog.lab_test(name) {
                Some(info) => order_line(info),
                None => format!("Order {} test", name),
            });
        }

        for name in &items.conditions {
            actions.push(match self.catalog.condition(name) {
                Some(info) => format!("{} - Time to obtain: {}", info.documentation, info.time_to_obtain),
                None => format!("Obtain documentation of {}", name),
            });
        }

        for name in &items.demographics {
            let lower = name.to_lowercase();
            actions.push(match lower.as_str() {
                "age" | "gender" => format!("Verify patient {} from medical records", lower),
                _ => format!("Collect missing {} information", name),
            });
        }

        for name in &items.medications {
            actions.push(format!("Review medication history for {}", name));
        }

        actions
    }

    fn priority_actions(&self, items: &MissingItems) -> Vec<String> {
        let mut actions: Vec<String> = items
            .biomarkers
            .iter()
            .map(|name| match self.catalog.biomarker(name) {
                Some(info) if info.urgency == Urgency::High => {
                    format!("URGENT: Order {} immediately", info.test_name)
                }
                Some(info) => format!("Order {} within 48 hours", info.test_name),
                None => format!("Order {} within 48 hours", name),
            })
            .collect();

        actions.extend(
            items
                .conditions
                .iter()
                .filter_map(|name| self.catalog.condition(name))
                .filter(|info| info.urgency == Urgency::High)
                .map(|info| format!("PRIORITY: {}", info.documentation)),
        );
        actions.extend(items.lab_tests.iter().map(|name| {
            let test = self
                .catalog
                .lab_test(name)
                .map_or(name.as_str(), |info| info.test_name.as_str());
            format!("Schedule {} at next visit", test)
        }));
        actions.extend(
            items
                .demographics
                .iter()
                .map(|name| format!("Update {} information in record", name)),
        );

        // Several missing labs can map to the same panel
        let mut seen = std::collections::HashSet::new();
        actions.retain(|action| seen.insert(action.clone()));
        actions
    }

    /// Longest upper-bound turnaround across catalogued items, in days.
    fn longest_turnaround_days(&self, items: &MissingItems) -> f64 {
        let tests = items
            .biomarkers
            .iter()
            .filter_map(|name| self.catalog.biomarker(name))
            .chain(items.lab_tests.iter().filter_map(|name| self.catalog.lab_test(name)))
            .map(|info| info.turnaround.max_days());

        let conditions = items
            .conditions
            .iter()
            .filter_map(|name| self.catalog.condition(name))
            .map(|info| info.time_to_obtain.max_days());

        tests.chain(conditions).fold(0.0, f64::max)
    }
}

fn order_line(info: &TestInfo) -> String {
    format!(
        "Order {} ({}) - Results in {}, Cost: {}",
        info.test_name, info.description, info.turnaround, info.cost
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MatchingEngine;
    use crate::models::{Operator, Predicate};

    fn observation(field: &str) -> Predicate {
        Predicate::builder(ResourceType::Observation, Operator::Present)
            .field(field)
            .build()
            .unwrap()
    }

    fn evaluate(predicates: &[Predicate]) -> CoverageReport {
        let features = PatientFeatures {
            age: Some(58),
            ..Default::default()
        };
        MatchingEngine::new()
            .evaluate_trial(&features, predicates)
            .coverage_report
            .unwrap()
    }

    #[test]
    fn test_biomarker_and_lab_gaps() {
        let report = evaluate(&[observation("HER2"), observation("KRAS"), observation("hemoglobin")]);

        assert_eq!(report.missing_biomarkers, vec!["HER2", "KRAS"]);
        assert_eq!(report.missing_lab_tests, vec!["hemoglobin"]);
        assert_eq!(report.missing_criteria, 3);
        assert_eq!(report.coverage_percentage, 0.0);

        // KRAS upper bound is 7 days
        assert_eq!(report.estimated_completion_time, CompletionEstimate::OneToTwoWeeks);
        assert_eq!(report.confidence_level, ConfidenceLevel::VeryLow);

        assert_eq!(
            report.recommended_actions[0],
            "Order HER2 IHC/ISH (HER2 protein expression and gene amplification) - Results in 3-5 days, Cost: $$"
        );
        assert_eq!(
            report.priority_actions,
            vec![
                "URGENT: Order HER2 IHC/ISH immediately",
                "Order KRAS Mutation Testing within 48 hours",
                "Schedule Complete Blood Count (CBC) at next visit",
            ]
        );
    }

    #[test]
    fn test_biomarker_priorities_keep_input_order() {
        let report = evaluate(&[observation("KRAS"), observation("EGFR"), observation("BRAF")]);

        assert_eq!(
            report.priority_actions,
            vec![
                "Order KRAS Mutation Testing within 48 hours",
                "URGENT: Order EGFR Mutation Testing immediately",
                "Order BRAF Mutation Testing within 48 hours",
            ]
        );
        assert_eq!(report.estimated_completion_time, CompletionEstimate::OneToTwoWeeks);
    }

    #[test]
    fn test_labs_only_finish_same_day() {
        let report = evaluate(&[observation("ALT"), observation("AST")]);

        assert_eq!(report.estimated_completion_time, CompletionEstimate::SameDay);
        assert_eq!(report.recommended_actions.len(), 2);
        // Both map to the same panel
        assert_eq!(report.priority_actions, vec!["Schedule Liver Function Tests at next visit"]);
    }

    #[test]
    fn test_no_missing_items_is_immediate() {
        let age = Predicate::builder(ResourceType::Patient, Operator::Ge)
            .field("age")
            .value(18)
            .build()
            .unwrap();
        let report = evaluate(&[age]);

        assert_eq!(report.estimated_completion_time, CompletionEstimate::Immediate);
        assert_eq!(report.confidence_level, ConfidenceLevel::VeryHigh);
        assert!(report.recommended_actions.is_empty());
        assert_eq!(report.summary(), "100.0% coverage (1/1 criteria matched)");
    }

    #[test]
    fn test_condition_demographic_and_medication_gaps() {
        let predicates = vec![
            Predicate::builder(ResourceType::Condition, Operator::Present)
                .field("heart disease")
                .build()
                .unwrap(),
            Predicate::builder(ResourceType::Patient, Operator::Eq)
                .field("gender")
                .value("female")
                .build()
                .unwrap(),
            Predicate::builder(ResourceType::Medication, Operator::Eq)
                .field("trastuzumab")
                .value("active")
                .build()
                .unwrap(),
        ];
        let report = evaluate(&predicates);

        // Condition not present is a failure, not a gap
        assert!(report.missing_conditions.is_empty());
        assert_eq!(report.failed_criteria, 1);
        assert_eq!(report.missing_demographics, vec!["gender"]);
        assert_eq!(report.missing_medications, vec!["trastuzumab"]);
        assert_eq!(
            report.recommended_actions,
            vec![
                "Verify patient gender from medical records",
                "Review medication history for trastuzumab",
            ]
        );
        assert_eq!(report.priority_actions, vec!["Update gender information in record"]);
    }

    #[test]
    fn test_condition_gap_uses_catalog() {
        let generator = CoverageReportGenerator::new();
        assert!(generator.catalog().condition("lung disease").is_some());
        let predicate = Predicate::builder(ResourceType::Condition, Operator::Eq)
            .field("lung disease")
            .value("severe")
            .build()
            .unwrap();
        let result = MatchingEngine::new().evaluate_trial(&PatientFeatures::default(), &[predicate]);
        let report = generator.generate(&PatientFeatures::default(), &result, "NCT000");

        assert_eq!(report.missing_conditions, vec!["lung disease"]);
        assert_eq!(
            report.recommended_actions,
            vec!["Pulmonary history and current status - Time to obtain: 2-3 days"]
        );
        assert_eq!(report.priority_actions, vec!["PRIORITY: Pulmonary history and current status"]);
        assert_eq!(report.estimated_completion_time, CompletionEstimate::ThreeToSevenDays);
    }
}
