//! Trial Match Core Library
//!
//! Matches a patient's clinical features against clinical-trial eligibility
//! criteria and produces a ranked, explainable list of candidate trials.
//!
//! # Architecture
//!
//! ```text
//! PatientFeatures ──┐
//!                   ├──► PredicateEvaluator ──► MatchOutcome (per predicate)
//! Predicate[] ──────┘                                 │
//!                                                     ▼
//!                                   ┌─────────────────────────────────┐
//!                                   │         MatchingEngine          │
//!                                   │  exclusion veto → buckets →     │
//!                                   │  weighted score → eligibility   │
//!                                   └────────────────┬────────────────┘
//!                                                    │
//!                             ┌──────────────────────┴──────────────────────┐
//!                             ▼                                             ▼
//!                   CoverageReportGenerator                          TrialRanker
//!                  (gaps, actions, time-to-complete)       (boost, filter, tie-break, rank)
//! ```
//!
//! # Core Principle
//!
//! **Missing data is not failure.** A fact absent from the patient record lowers
//! the score by a configurable penalty and becomes a data request; it never
//! aborts evaluation of a trial.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Predicate, PatientFeatures, TrialMatchResult, etc.)
//! - [`evaluator`]: Predicate evaluation with enum and unit normalization
//! - [`engine`]: Exclusion handling, weighted scoring and explanations
//! - [`coverage`]: Gap analysis and data-collection recommendations
//! - [`ranker`]: Priority boosts and deterministic tie-breaking
//! - [`config`]: Scoring and ranking thresholds

pub mod config;
pub mod coverage;
pub mod engine;
pub mod evaluator;
pub mod models;
pub mod ranker;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

// Re-export commonly used types
pub use config::{ConfigError, MatcherConfig, MatchingConfig, RankingConfig};
pub use coverage::{CatalogError, CoverageReportGenerator, GapCatalog};
pub use engine::MatchingEngine;
pub use evaluator::{Normalizer, PredicateEvaluator};
pub use models::{
    CoverageReport, MatchOutcome, Operator, PatientFeatures, Predicate, PredicateError,
    PredicateValue, RankedTrial, RankingInfo, RankingSummary, RecruitingStatus, ResourceType,
    TrialCriteria, TrialMatchResult,
};
pub use ranker::TrialRanker;

#[derive(Debug, thiserror::Error)]
pub enum TrialMatchError {
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(#[from] PredicateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type MatchResult<T> = Result<T, TrialMatchError>;

/// Outcome of matching one patient against a batch of trials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchReport {
    /// Number of candidate trials evaluated (before ranking filters)
    pub total_trials_evaluated: usize,
    /// Evaluated trials that passed the eligibility threshold
    pub eligible_trials: usize,
    pub patient_has_evaluable_features: bool,
    pub ranked_trials: Vec<RankedTrial>,
    pub summary: RankingSummary,
}

/// Evaluates and ranks trials for a patient.
#[derive(Debug, Clone, Default)]
pub struct TrialMatcher {
    engine: MatchingEngine,
    ranker: TrialRanker,
    config: MatcherConfig,
}

impl TrialMatcher {
    /// Create a matcher. The configuration is used as given.
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            engine: MatchingEngine::with_config(config.matching),
            ranker: TrialRanker::new(),
            config,
        }
    }

    /// Create a matcher after validating the configuration.
    pub fn try_new(config: MatcherConfig) -> MatchResult<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Replace the engine, e.g. to supply custom lookup tables.
    ///
    /// The engine keeps its own matching configuration.
    pub fn with_engine(mut self, engine: MatchingEngine) -> Self {
        self.config.matching = *engine.config();
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    /// Evaluate every trial against the patient, then rank the results.
    pub fn match_trials(
        &self,
        features: &PatientFeatures,
        trials: &[TrialCriteria],
        ranking_info: &HashMap<String, RankingInfo>,
    ) -> MatchReport {
        let results = self.engine.evaluate_trials(features, trials);
        let eligible_trials = results.iter().filter(|(_, r)| r.eligible).count();

        let ranked_trials = self.ranker.rank(results, ranking_info, &self.config.ranking);
        let summary = self.ranker.summarize(&ranked_trials, &self.config.ranking);

        info!(
            evaluated = trials.len(),
            eligible = eligible_trials,
            ranked = ranked_trials.len(),
            "matched patient against trials"
        );

        MatchReport {
            total_trials_evaluated: trials.len(),
            eligible_trials,
            patient_has_evaluable_features: features.has_evaluable_features(),
            ranked_trials,
            summary,
        }
    }

    /// JSON variant of [`TrialMatcher::match_trials`].
    ///
    /// `ranking_json` is an object keyed by trial id; an empty string means
    /// no ranking metadata.
    pub fn match_trials_json(&self, features_json: &str, trials_json: &str, ranking_json: &str) -> MatchResult<String> {
        let features: PatientFeatures = serde_json::from_str(features_json)?;
        let trials: Vec<TrialCriteria> = serde_json::from_str(trials_json)?;
        let ranking_info: HashMap<String, RankingInfo> = if ranking_json.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(ranking_json)?
        };

        let report = self.match_trials(&features, &trials, &ranking_info);
        Ok(serde_json::to_string(&report)?)
    }
}

/// Match with the default configuration, taking and returning JSON.
pub fn match_trials_json(features_json: &str, trials_json: &str, ranking_json: &str) -> MatchResult<String> {
    TrialMatcher::default().match_trials_json(features_json, trials_json, ranking_json)
}
