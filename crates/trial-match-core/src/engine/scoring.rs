//! Weighted match scoring.
//!
//! score = 100·M/W − α·(U/W)·100, clamped to [0, 100]
//! - M: weight of matched inclusions
//! - W: weight of all inclusions
//! - U: weight of inclusions with missing data
//!
//! Unmatched inclusions count toward W only.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MatchingConfig;
use crate::models::CriterionResult;

/// Score when a trial has no inclusion criteria.
pub const VACUOUS_SCORE: f64 = 100.0;

/// Weight totals feeding the score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ScoreComponents {
    pub matched_weight: f64,
    pub total_weight: f64,
    pub missing_weight: f64,
}

impl ScoreComponents {
    /// Sum predicate weights over the three inclusion buckets.
    pub fn from_buckets(
        matched: &[CriterionResult],
        unmatched: &[CriterionResult],
        missing: &[CriterionResult],
    ) -> Self {
        let weight = |bucket: &[CriterionResult]| -> f64 {
            bucket.iter().map(|r| f64::from(r.predicate.weight())).sum()
        };

        let matched_weight = weight(matched);
        let missing_weight = weight(missing);
        Self {
            matched_weight,
            total_weight: matched_weight + weight(unmatched) + missing_weight,
            missing_weight,
        }
    }

    /// Calculate the clamped 0-100 score.
    pub fn weighted_score(&self, alpha: f64) -> f64 {
        compute_score(self.matched_weight, self.total_weight, self.missing_weight, alpha)
    }
}

/// Compute the weighted score from raw weight totals.
pub fn compute_score(matched_weight: f64, total_weight: f64, missing_weight: f64, alpha: f64) -> f64 {
    if total_weight <= 0.0 {
        return VACUOUS_SCORE;
    }

    let base = 100.0 * matched_weight / total_weight;
    let penalty = alpha * (missing_weight / total_weight) * 100.0;
    let score = (base - penalty).clamp(0.0, 100.0);

    debug!(
        matched_weight,
        total_weight,
        missing_weight,
        alpha,
        score,
        "computed match score"
    );
    score
}

/// Decide eligibility.
///
/// With a score, eligibility is `score >= eligibility_threshold`. Without one,
/// the legacy coverage rule applies: `matched / total >= coverage_fallback_ratio`,
/// which holds vacuously when there are no inclusion criteria.
pub fn determine_eligibility(
    score: Option<f64>,
    matched_count: usize,
    total_inclusions: usize,
    config: &MatchingConfig,
) -> bool {
    match score {
        Some(score) => score >= config.eligibility_threshold,
        None if total_inclusions == 0 => true,
        None => matched_count as f64 / total_inclusions as f64 >= config.coverage_fallback_ratio,
    }
}
