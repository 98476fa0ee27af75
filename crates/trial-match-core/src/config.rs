//! Matching and ranking configuration.
//!
//! All values have defaults; JSON documents may override any subset.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("alpha must be a finite, non-negative number (got {0})")]
    InvalidAlpha(f64),

    #[error("{name} must be within [{min}, {max}] (got {value})")]
    ThresholdOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("priority_threshold ({priority}) must be below min_score ({min_score})")]
    PriorityAboveMinimum { priority: f64, min_score: f64 },

    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Scoring and eligibility settings for the matching engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Missing-data penalty coefficient
    pub alpha: f64,
    /// Minimum score (0 - 100) for a trial to be eligible
    pub eligibility_threshold: f64,
    /// Matched/total ratio used by the legacy coverage-based eligibility rule
    pub coverage_fallback_ratio: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            alpha: 0.25,
            eligibility_threshold: 80.0,
            coverage_fallback_ratio: 0.8,
        }
    }
}

impl MatchingConfig {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_eligibility_threshold(mut self, threshold: f64) -> Self {
        self.eligibility_threshold = threshold;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        check_range("eligibility_threshold", self.eligibility_threshold, 0.0, 100.0)?;
        check_range("coverage_fallback_ratio", self.coverage_fallback_ratio, 0.0, 1.0)
    }
}

/// Thresholds for the ranker. Passed explicitly on every ranking call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    /// Minimum final score for a trial to be kept
    pub min_score: f64,
    /// Lower bar for trials with zero exclusions and every must-have biomarker
    pub priority_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            min_score: 60.0,
            priority_threshold: 50.0,
        }
    }
}

impl RankingConfig {
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }

    pub fn with_priority_threshold(mut self, threshold: f64) -> Self {
        self.priority_threshold = threshold;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        check_range("min_score", self.min_score, 0.0, 100.0)?;
        check_range("priority_threshold", self.priority_threshold, 0.0, 100.0)?;
        if self.priority_threshold >= self.min_score {
            return Err(ConfigError::PriorityAboveMinimum {
                priority: self.priority_threshold,
                min_score: self.min_score,
            });
        }
        Ok(())
    }
}

/// Complete configuration for [`crate::TrialMatcher`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MatcherConfig {
    pub matching: MatchingConfig,
    pub ranking: RankingConfig,
}

impl MatcherConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.matching.validate()?;
        self.ranking.validate()
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> ConfigResult<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}
