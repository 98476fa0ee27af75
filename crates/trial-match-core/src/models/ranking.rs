//! Trial ranking models.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::TrialMatchResult;

/// Boost for a trial with no exclusions and every must-have biomarker.
pub const BOOST_ALL_CRITERIA: f64 = 20.0;
/// Boost for a trial with no exclusions triggered.
pub const BOOST_ZERO_EXCLUSIONS: f64 = 10.0;
/// Boost for a trial where every must-have biomarker matched.
pub const BOOST_MUST_HAVE: f64 = 5.0;

/// Registry recruitment status, ordered from most to least favorable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecruitingStatus {
    Recruiting,
    ActiveNotRecruiting,
    NotYetRecruiting,
    Completed,
    Terminated,
    Suspended,
    Withdrawn,
    #[default]
    Unknown,
}

impl RecruitingStatus {
    /// Tie-break priority (lower is more favorable).
    pub fn priority(&self) -> u8 {
        match self {
            RecruitingStatus::Recruiting => 1,
            RecruitingStatus::ActiveNotRecruiting => 2,
            RecruitingStatus::NotYetRecruiting => 3,
            RecruitingStatus::Completed => 4,
            RecruitingStatus::Terminated => 5,
            RecruitingStatus::Suspended => 6,
            RecruitingStatus::Withdrawn => 7,
            RecruitingStatus::Unknown => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecruitingStatus::Recruiting => "Recruiting",
            RecruitingStatus::ActiveNotRecruiting => "Active, not recruiting",
            RecruitingStatus::NotYetRecruiting => "Not yet recruiting",
            RecruitingStatus::Completed => "Completed",
            RecruitingStatus::Terminated => "Terminated",
            RecruitingStatus::Suspended => "Suspended",
            RecruitingStatus::Withdrawn => "Withdrawn",
            RecruitingStatus::Unknown => "Unknown",
        }
    }

    /// Lenient parse of registry spellings ("Active, not recruiting",
    /// "ACTIVE_NOT_RECRUITING", ...). Unrecognized text maps to `Unknown`.
    pub fn parse(status: &str) -> Self {
        let key: String = status
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_lowercase();

        match key.as_str() {
            "recruiting" => RecruitingStatus::Recruiting,
            "activenotrecruiting" => RecruitingStatus::ActiveNotRecruiting,
            "notyetrecruiting" => RecruitingStatus::NotYetRecruiting,
            "completed" => RecruitingStatus::Completed,
            "terminated" => RecruitingStatus::Terminated,
            "suspended" => RecruitingStatus::Suspended,
            "withdrawn" => RecruitingStatus::Withdrawn,
            _ => RecruitingStatus::Unknown,
        }
    }
}

impl fmt::Display for RecruitingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for RecruitingStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<RecruitingStatus> for String {
    fn from(status: RecruitingStatus) -> Self {
        status.as_str().to_string()
    }
}

/// Trial metadata used for boosting and tie-breaking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RankingInfo {
    #[serde(default)]
    pub recruiting_status: RecruitingStatus,
    /// Study start date; newer trials win ties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Biomarkers the trial considers essential
    #[serde(default)]
    pub must_have_biomarkers: Vec<String>,
    /// Every must-have biomarker was matched
    #[serde(default)]
    pub has_all_must_have: bool,
    /// No exclusion criterion was triggered
    #[serde(default)]
    pub zero_exclusions: bool,
}

impl RankingInfo {
    /// Priority boost added to the base score.
    pub fn priority_boost(&self) -> f64 {
        match (self.zero_exclusions, self.has_all_must_have) {
            (true, true) => BOOST_ALL_CRITERIA,
            (true, false) => BOOST_ZERO_EXCLUSIONS,
            (false, true) => BOOST_MUST_HAVE,
            (false, false) => 0.0,
        }
    }

    /// Must-have biomarkers that no matched inclusion of `result` names.
    pub fn missing_must_have(&self, result: &TrialMatchResult) -> Vec<&str> {
        self.must_have_biomarkers
            .iter()
            .map(String::as_str)
            .filter(|biomarker| {
                let biomarker = biomarker.trim().to_lowercase();
                !result
                    .matched_inclusions
                    .iter()
                    .any(|c| c.predicate.label().to_lowercase().contains(&biomarker))
            })
            .collect()
    }

    /// Both priority conditions hold.
    pub fn is_priority(&self) -> bool {
        self.zero_exclusions && self.has_all_must_have
    }
}

/// A trial in the final ranked list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedTrial {
    pub trial_id: String,
    pub result: TrialMatchResult,
    /// 1-based position after sorting
    pub rank: usize,
    /// min(100, base score + boost)
    pub final_score: f64,
    pub priority_boost: f64,
    pub ranking_info: RankingInfo,
    /// Why this trial sits below an equal-scoring neighbour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie_breaker_reason: Option<String>,
}

/// Count of ranked trials per score band.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ScoreDistribution {
    /// final score >= 90
    pub excellent: usize,
    /// 80 - 90
    pub good: usize,
    /// 70 - 80
    pub fair: usize,
    /// 60 - 70
    pub marginal: usize,
}

/// Aggregate statistics over a ranked list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RankingSummary {
    pub total_trials: usize,
    pub eligible_trials: usize,
    pub score_distribution: ScoreDistribution,
    pub priority_trials: usize,
    pub recruiting_status: BTreeMap<String, usize>,
    pub min_score_threshold: f64,
    pub priority_threshold: f64,
}
