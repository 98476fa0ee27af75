//! Trial ranking.
//!
//! Pipeline: Boost → Threshold filter → Sort → Tie-break reasons → Ranks
//!
//! Sort keys, in order:
//! 1. Final score (descending)
//! 2. Recruiting status priority (ascending)
//! 3. Start date (newest first, missing last)
//! 4. Priority boost (descending)
//! 5. Trial ID (ascending)

use std::cmp::Ordering;
use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::RankingConfig;
use crate::models::{RankedTrial, RankingInfo, RankingSummary, ScoreDistribution, TrialMatchResult};

/// Orders match results into a ranked list.
///
/// Holds no state; configuration is supplied per call, so a single ranker
/// can be shared across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrialRanker;

impl TrialRanker {
    pub fn new() -> Self {
        Self
    }

    /// Rank `(trial_id, result)` pairs.
    ///
    /// Trials without an entry in `ranking_info` use `RankingInfo::default()`.
    pub fn rank(
        &self,
        results: Vec<(String, TrialMatchResult)>,
        ranking_info: &HashMap<String, RankingInfo>,
        config: &RankingConfig,
    ) -> Vec<RankedTrial> {
        let candidates = results.len();

        let mut ranked: Vec<RankedTrial> = results
            .into_iter()
            .map(|(trial_id, result)| {
                let info = ranking_info.get(&trial_id).cloned().unwrap_or_default();
                boosted(trial_id, result, info)
            })
            .filter(|trial| passes_threshold(trial, config))
            .collect();

        ranked.sort_by(compare_trials);

        for i in 1..ranked.len() {
            let (prev, trial) = (&ranked[i - 1], &ranked[i]);
            if trial.final_score == prev.final_score {
                let reason = tie_breaker_reason(prev, trial);
                ranked[i].tie_breaker_reason = Some(reason);
            }
        }

        for (i, trial) in ranked.iter_mut().enumerate() {
            trial.rank = i + 1;
        }

        debug!(candidates, kept = ranked.len(), min_score = config.min_score, "ranked trials");
        ranked
    }

    /// Aggregate statistics over a ranked list.
    pub fn summarize(&self, ranked: &[RankedTrial], config: &RankingConfig) -> RankingSummary {
        let mut summary = RankingSummary {
            total_trials: ranked.len(),
            min_score_threshold: config.min_score,
            priority_threshold: config.priority_threshold,
            ..Default::default()
        };

        for trial in ranked {
            if trial.result.eligible {
                summary.eligible_trials += 1;
            }
            if trial.priority_boost > 0.0 {
                summary.priority_trials += 1;
            }
            add_to_distribution(&mut summary.score_distribution, trial.final_score);
            *summary
                .recruiting_status
                .entry(trial.ranking_info.recruiting_status.to_string())
                .or_insert(0) += 1;
        }

        summary
    }
}

fn boosted(trial_id: String, result: TrialMatchResult, ranking_info: RankingInfo) -> RankedTrial {
    let priority_boost = ranking_info.priority_boost();
    if ranking_info.has_all_must_have {
        let unmatched = ranking_info.missing_must_have(&result);
        if !unmatched.is_empty() {
            debug!(%trial_id, ?unmatched, "must-have flag set but biomarkers not matched");
        }
    }
    let final_score = (result.score + priority_boost).min(100.0);

    RankedTrial {
        trial_id,
        result,
        rank: 0,
        final_score,
        priority_boost,
        ranking_info,
        tie_breaker_reason: None,
    }
}

fn passes_threshold(trial: &RankedTrial, config: &RankingConfig) -> bool {
    if trial.final_score >= config.min_score {
        return true;
    }

    if trial.ranking_info.is_priority() && trial.final_score >= config.priority_threshold {
        info!(
            trial_id = %trial.trial_id,
            final_score = trial.final_score,
            "including priority trial below minimum score"
        );
        return true;
    }

    false
}

fn compare_trials(a: &RankedTrial, b: &RankedTrial) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| compare_status(a, b))
        .then_with(|| compare_start_date(a, b))
        .then_with(|| b.priority_boost.total_cmp(&a.priority_boost))
        .then_with(|| a.trial_id.cmp(&b.trial_id))
}

fn compare_status(a: &RankedTrial, b: &RankedTrial) -> Ordering {
    a.ranking_info
        .recruiting_status
        .priority()
        .cmp(&b.ranking_info.recruiting_status.priority())
}

/// Newer dates first; a missing date sorts after any known date.
fn compare_start_date(a: &RankedTrial, b: &RankedTrial) -> Ordering {
    match (a.ranking_info.start_date, b.ranking_info.start_date) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Explain why `trial` was placed after `prev` despite an equal final score.
fn tie_breaker_reason(prev: &RankedTrial, trial: &RankedTrial) -> String {
    if compare_status(prev, trial) != Ordering::Equal {
        return format!(
            "Tie broken by recruiting status ({} ranks ahead of {})",
            prev.ranking_info.recruiting_status, trial.ranking_info.recruiting_status
        );
    }

    if compare_start_date(prev, trial) != Ordering::Equal {
        let started = |t: &RankedTrial| {
            t.ranking_info
                .start_date
                .map_or_else(|| "unknown".to_string(), |d| d.format("%Y-%m-%d").to_string())
        };
        return format!(
            "Tie broken by start date ({} started {}, this trial {})",
            prev.trial_id,
            started(prev),
            started(trial)
        );
    }

    if prev.priority_boost != trial.priority_boost {
        return format!(
            "Tie broken by priority boost (+{} vs +{})",
            prev.priority_boost, trial.priority_boost
        );
    }

    "Tie broken by trial ID (alphabetical)".to_string()
}

fn add_to_distribution(distribution: &mut ScoreDistribution, score: f64) {
    match score {
        s if s >= 90.0 => distribution.excellent += 1,
        s if s >= 80.0 => distribution.good += 1,
        s if s >= 70.0 => distribution.fair += 1,
        s if s >= 60.0 => distribution.marginal += 1,
        _ => {}
    }
}
