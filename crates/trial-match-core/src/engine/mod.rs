//! Matching engine for a single trial.
//!
//! Pipeline: Exclusions (veto) → Inclusions → Reconciliation → Scoring
//! → Reasons + Data requests → Coverage report

mod requests;
pub mod scoring;

pub use requests::*;
pub use scoring::{compute_score, determine_eligibility, ScoreComponents};

use tracing::{debug, info};

use crate::config::MatchingConfig;
use crate::coverage::CoverageReportGenerator;
use crate::evaluator::PredicateEvaluator;
use crate::models::{
    CriterionResult, PatientFeatures, Predicate, ResourceType, TrialCriteria, TrialMatchResult,
};

/// Evaluates a patient against trial criteria.
#[derive(Debug, Clone, Default)]
pub struct MatchingEngine {
    evaluator: PredicateEvaluator,
    requests: DataRequestCatalog,
    coverage: CoverageReportGenerator,
    config: MatchingConfig,
}

impl MatchingEngine {
    /// Create an engine with default tables and configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(config: MatchingConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Replace the predicate evaluator.
    pub fn with_evaluator(mut self, evaluator: PredicateEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    /// Replace the data-request catalog.
    pub fn with_requests(mut self, requests: DataRequestCatalog) -> Self {
        self.requests = requests;
        self
    }

    /// Replace the coverage report generator.
    pub fn with_coverage(mut self, coverage: CoverageReportGenerator) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Get the evaluator for direct access.
    pub fn evaluator(&self) -> &PredicateEvaluator {
        &self.evaluator
    }

    /// Evaluate one trial.
    pub fn evaluate_trial(&self, features: &PatientFeatures, predicates: &[Predicate]) -> TrialMatchResult {
        self.evaluate_trial_for("unknown", features, predicates)
    }

    /// Evaluate one trial, tagging log output and the coverage report with its id.
    pub fn evaluate_trial_for(
        &self,
        trial_id: &str,
        features: &PatientFeatures,
        predicates: &[Predicate],
    ) -> TrialMatchResult {
        let (exclusions, inclusions): (Vec<&Predicate>, Vec<&Predicate>) =
            predicates.iter().partition(|p| p.is_exclusion());

        // Step 1: Exclusions veto the trial outright
        let triggered: Vec<CriterionResult> = exclusions
            .into_iter()
            .map(|p| self.judge(features, p))
            .filter(|r| r.outcome.matched)
            .collect();

        if !triggered.is_empty() {
            info!(trial_id, exclusions = triggered.len(), "exclusion criteria triggered");
            return excluded_result(triggered, inclusions.len());
        }

        // Step 2: Inclusions
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();
        let mut missing = Vec::new();

        for result in inclusions.into_iter().map(|p| self.judge(features, p)) {
            if result.outcome.matched {
                matched.push(result);
            } else if result.outcome.missing_data || is_unfound_observation(&result) {
                missing.push(result);
            } else {
                unmatched.push(result);
            }
        }

        // Step 3: Score and eligibility
        let components = ScoreComponents::from_buckets(&matched, &unmatched, &missing);
        let score = components.weighted_score(self.config.alpha);
        let total_inclusions = matched.len() + unmatched.len() + missing.len();
        let eligible = determine_eligibility(Some(score), matched.len(), total_inclusions, &self.config);

        debug!(
            trial_id,
            score,
            eligible,
            matched = matched.len(),
            unmatched = unmatched.len(),
            missing = missing.len(),
            "trial evaluated"
        );

        // Step 4: Explanation
        let reasons = build_reasons(&matched, &unmatched, &missing);
        let suggested_data = missing
            .iter()
            .map(|r| self.requests.request_for(&r.predicate))
            .collect();

        let mut result = TrialMatchResult {
            eligible,
            score,
            matched_count: matched.len(),
            coverage_percentage: coverage_percentage(matched.len(), total_inclusions),
            total_inclusions,
            matched_inclusions: matched,
            unmatched_inclusions: unmatched,
            missing_inclusions: missing,
            exclusions_triggered: Vec::new(),
            reasons,
            suggested_data,
            coverage_report: None,
        };

        // Step 5: Gap analysis
        result.coverage_report = Some(self.coverage.generate(features, &result, trial_id));
        result
    }

    /// Evaluate many trials against one patient, preserving input order.
    #[cfg(feature = "parallel")]
    pub fn evaluate_trials(
        &self,
        features: &PatientFeatures,
        trials: &[TrialCriteria],
    ) -> Vec<(String, TrialMatchResult)> {
        use rayon::prelude::*;

        trials
            .par_iter()
            .map(|t| (t.trial_id.clone(), self.evaluate_trial_for(&t.trial_id, features, &t.predicates)))
            .collect()
    }

    /// Evaluate many trials against one patient, preserving input order.
    #[cfg(not(feature = "parallel"))]
    pub fn evaluate_trials(
        &self,
        features: &PatientFeatures,
        trials: &[TrialCriteria],
    ) -> Vec<(String, TrialMatchResult)> {
        trials
            .iter()
            .map(|t| (t.trial_id.clone(), self.evaluate_trial_for(&t.trial_id, features, &t.predicates)))
            .collect()
    }

    fn judge(&self, features: &PatientFeatures, predicate: &Predicate) -> CriterionResult {
        CriterionResult {
            predicate: predicate.clone(),
            outcome: self.evaluator.evaluate(features, predicate),
        }
    }
}

/// An observation that was never found counts as missing data, not failure.
fn is_unfound_observation(result: &CriterionResult) -> bool {
    result.predicate.resource_type() == ResourceType::Observation && result.outcome.denotes_not_present()
}

fn excluded_result(triggered: Vec<CriterionResult>, total_inclusions: usize) -> TrialMatchResult {
    let reasons = triggered
        .iter()
        .map(|r| {
            let why = r.predicate.reason().unwrap_or(&r.outcome.evidence);
            format!("Excluded: {}", why)
        })
        .collect();

    TrialMatchResult {
        eligible: false,
        score: 0.0,
        matched_inclusions: Vec::new(),
        unmatched_inclusions: Vec::new(),
        missing_inclusions: Vec::new(),
        exclusions_triggered: triggered,
        total_inclusions,
        matched_count: 0,
        coverage_percentage: 0.0,
        reasons,
        suggested_data: Vec::new(),
        coverage_report: None,
    }
}

fn coverage_percentage(matched: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        matched as f64 / total as f64 * 100.0
    }
}

fn build_reasons(
    matched: &[CriterionResult],
    unmatched: &[CriterionResult],
    missing: &[CriterionResult],
) -> Vec<String> {
    let groups = [
        (matched, format!("Matched {} inclusion criteria:", matched.len())),
        (unmatched, format!("Failed {} inclusion criteria:", unmatched.len())),
        (missing, format!("Missing data for {} criteria:", missing.len())),
    ];

    let mut reasons = Vec::new();
    for (bucket, heading) in groups {
        if bucket.is_empty() {
            continue;
        }
        reasons.push(heading);
        reasons.extend(
            bucket
                .iter()
                .map(|r| format!("  - {}: {}", r.predicate.describe(), r.outcome.evidence)),
        );
    }
    reasons
}
