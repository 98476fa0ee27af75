//! Gap catalog: what it takes to obtain missing data.
//!
//! Biomarker and lab entries carry test name, description, urgency,
//! turnaround and cost tier; condition entries carry the documentation to
//! request and the time to obtain it. The catalog is plain data and can be
//! loaded from JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Catalog errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid turnaround: {0}")]
    InvalidTurnaround(String),

    #[error("Invalid cost tier: {0}")]
    InvalidCost(String),

    #[error("Invalid catalog JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// How soon a missing item should be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

/// Relative cost of a test, from `$` to `$$$$`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CostTier {
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl CostTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostTier::Low => "$",
            CostTier::Moderate => "$$",
            CostTier::High => "$$$",
            CostTier::VeryHigh => "$$$$",
        }
    }
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CostTier {
    type Err = CatalogError;

    fn from_str(s: &str) -> CatalogResult<Self> {
        match s.trim() {
            "$" => Ok(CostTier::Low),
            "$$" => Ok(CostTier::Moderate),
            "$$$" => Ok(CostTier::High),
            "$$$$" => Ok(CostTier::VeryHigh),
            other => Err(CatalogError::InvalidCost(other.to_string())),
        }
    }
}

impl TryFrom<String> for CostTier {
    type Error = CatalogError;

    fn try_from(s: String) -> CatalogResult<Self> {
        s.parse()
    }
}

impl From<CostTier> for String {
    fn from(cost: CostTier) -> Self {
        cost.as_str().to_string()
    }
}

/// Unit of a turnaround range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Hours,
    Days,
    Weeks,
}

impl TimeUnit {
    fn in_days(&self) -> f64 {
        match self {
            TimeUnit::Hours => 1.0 / 24.0,
            TimeUnit::Days => 1.0,
            TimeUnit::Weeks => 7.0,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TimeUnit::Hours => "hours",
            TimeUnit::Days => "days",
            TimeUnit::Weeks => "weeks",
        }
    }
}

/// A turnaround range such as "3-5 days", "1-2 hours" or "Immediate".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Turnaround {
    pub min: f64,
    pub max: f64,
    pub unit: TimeUnit,
}

impl Turnaround {
    pub fn immediate() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            unit: TimeUnit::Hours,
        }
    }

    pub fn hours(min: f64, max: f64) -> Self {
        Self { min, max, unit: TimeUnit::Hours }
    }

    pub fn days(min: f64, max: f64) -> Self {
        Self { min, max, unit: TimeUnit::Days }
    }

    /// Upper bound of the range in days.
    pub fn max_days(&self) -> f64 {
        self.max * self.unit.in_days()
    }
}

impl fmt::Display for Turnaround {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max <= 0.0 {
            f.write_str("Immediate")
        } else if self.min == self.max {
            write!(f, "{} {}", self.max, self.unit.label())
        } else {
            write!(f, "{}-{} {}", self.min, self.max, self.unit.label())
        }
    }
}

impl FromStr for Turnaround {
    type Err = CatalogError;

    fn from_str(s: &str) -> CatalogResult<Self> {
        let invalid = || CatalogError::InvalidTurnaround(s.to_string());
        let text = s.trim().to_lowercase();

        if text == "immediate" {
            return Ok(Self::immediate());
        }

        let (range, unit) = text.split_once(char::is_whitespace).ok_or_else(invalid)?;
        let unit = match unit.trim() {
            "hour" | "hours" => TimeUnit::Hours,
            "day" | "days" => TimeUnit::Days,
            "week" | "weeks" => TimeUnit::Weeks,
            _ => return Err(invalid()),
        };

        let parse = |n: &str| n.trim().parse::<f64>().map_err(|_| invalid());
        let (min, max) = match range.split_once('-') {
            Some((low, high)) => (parse(low)?, parse(high)?),
            None => {
                let n = parse(range)?;
                (n, n)
            }
        };

        if !min.is_finite() || !max.is_finite() || min < 0.0 || max < min {
            return Err(invalid());
        }
        Ok(Self { min, max, unit })
    }
}

impl TryFrom<String> for Turnaround {
    type Error = CatalogError;

    fn try_from(s: String) -> CatalogResult<Self> {
        s.parse()
    }
}

impl From<Turnaround> for String {
    fn from(t: Turnaround) -> Self {
        t.to_string()
    }
}

/// An orderable test (biomarker assay or lab panel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInfo {
    pub test_name: String,
    pub description: String,
    pub urgency: Urgency,
    pub turnaround: Turnaround,
    pub cost: CostTier,
}

impl TestInfo {
    pub fn new(
        test_name: &str,
        description: &str,
        urgency: Urgency,
        turnaround: Turnaround,
        cost: CostTier,
    ) -> Self {
        Self {
            test_name: test_name.into(),
            description: description.into(),
            urgency,
            turnaround,
            cost,
        }
    }
}

/// Documentation needed to establish a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionInfo {
    pub documentation: String,
    pub urgency: Urgency,
    pub time_to_obtain: Turnaround,
}

/// Lookup tables keyed by lowercase keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapCatalog {
    #[serde(default)]
    pub biomarkers: BTreeMap<String, TestInfo>,
    #[serde(default)]
    pub lab_tests: BTreeMap<String, TestInfo>,
    #[serde(default)]
    pub conditions: BTreeMap<String, ConditionInfo>,
}

impl Default for GapCatalog {
    fn default() -> Self {
        Self {
            biomarkers: Self::default_biomarkers(),
            lab_tests: Self::default_lab_tests(),
            conditions: Self::default_conditions(),
        }
    }
}

impl GapCatalog {
    /// Load a catalog from JSON. Tables omitted from the document are empty.
    pub fn from_json(json: &str) -> CatalogResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Find the biomarker entry whose keyword appears in `name`.
    pub fn biomarker(&self, name: &str) -> Option<&TestInfo> {
        find_by_keyword(&self.biomarkers, name)
    }

    pub fn lab_test(&self, name: &str) -> Option<&TestInfo> {
        find_by_keyword(&self.lab_tests, name)
    }

    pub fn condition(&self, name: &str) -> Option<&ConditionInfo> {
        find_by_keyword(&self.conditions, name)
    }

    /// Check whether an observation name refers to a biomarker.
    pub fn is_biomarker(&self, name: &str) -> bool {
        self.biomarker(name).is_some()
    }

    pub fn add_biomarker(&mut self, keyword: &str, info: TestInfo) {
        self.biomarkers.insert(keyword.trim().to_lowercase(), info);
    }

    pub fn add_lab_test(&mut self, keyword: &str, info: TestInfo) {
        self.lab_tests.insert(keyword.trim().to_lowercase(), info);
    }

    pub fn add_condition(&mut self, keyword: &str, info: ConditionInfo) {
        self.conditions.insert(keyword.trim().to_lowercase(), info);
    }

    fn default_biomarkers() -> BTreeMap<String, TestInfo> {
        let mut map = BTreeMap::new();

        // Targetable drivers
        map.insert(
            "her2".into(),
            TestInfo::new(
                "HER2 IHC/ISH",
                "HER2 protein expression and gene amplification",
                Urgency::High,
                Turnaround::days(3.0, 5.0),
                CostTier::Moderate,
            ),
        );
        map.insert(
            "egfr".into(),
            TestInfo::new(
                "EGFR Mutation Testing",
                "EGFR gene mutation analysis",
                Urgency::High,
                Turnaround::days(7.0, 10.0),
                CostTier::High,
            ),
        );
        map.insert(
            "alk".into(),
            TestInfo::new(
                "ALK Rearrangement Testing",
                "ALK gene rearrangement analysis",
                Urgency::High,
                Turnaround::days(7.0, 10.0),
                CostTier::High,
            ),
        );
        map.insert(
            "kras".into(),
            TestInfo::new(
                "KRAS Mutation Testing",
                "KRAS gene mutation analysis",
                Urgency::Medium,
                Turnaround::days(5.0, 7.0),
                CostTier::Moderate,
            ),
        );
        map.insert(
            "braf".into(),
            TestInfo::new(
                "BRAF Mutation Testing",
                "BRAF gene mutation analysis",
                Urgency::Medium,
                Turnaround::days(5.0, 7.0),
                CostTier::Moderate,
            ),
        );

        // Immunotherapy markers
        map.insert(
            "pdl1".into(),
            TestInfo::new(
                "PD-L1 IHC Testing",
                "PD-L1 protein expression",
                Urgency::Medium,
                Turnaround::days(3.0, 5.0),
                CostTier::Moderate,
            ),
        );
        map.insert(
            "msi".into(),
            TestInfo::new(
                "MSI/MMR Testing",
                "Microsatellite instability and mismatch repair status",
                Urgency::Medium,
                Turnaround::days(7.0, 10.0),
                CostTier::High,
            ),
        );
        map.insert(
            "tmb".into(),
            TestInfo::new(
                "Tumor Mutational Burden",
                "Tumor mutational burden assessment",
                Urgency::Medium,
                Turnaround::days(10.0, 14.0),
                CostTier::VeryHigh,
            ),
        );

        map
    }

    fn default_lab_tests() -> BTreeMap<String, TestInfo> {
        let cbc = || {
            TestInfo::new(
                "Complete Blood Count (CBC)",
                "Blood cell counts and hemoglobin",
                Urgency::Low,
                Turnaround::hours(1.0, 2.0),
                CostTier::Low,
            )
        };
        let cmp = || {
            TestInfo::new(
                "Comprehensive Metabolic Panel",
                "Kidney function, electrolytes and proteins",
                Urgency::Low,
                Turnaround::hours(1.0, 2.0),
                CostTier::Low,
            )
        };
        let lft = || {
            TestInfo::new(
                "Liver Function Tests",
                "Liver enzymes and bilirubin",
                Urgency::Low,
                Turnaround::hours(1.0, 2.0),
                CostTier::Low,
            )
        };

        let mut map = BTreeMap::new();

        // Hematology
        map.insert("hemoglobin".into(), cbc());
        map.insert("platelets".into(), cbc());

        // Chemistry
        map.insert("creatinine".into(), cmp());
        map.insert("albumin".into(), cmp());

        // Liver
        map.insert("alt".into(), lft());
        map.insert("ast".into(), lft());
        map.insert("bilirubin".into(), lft());

        // Performance status
        map.insert(
            "ecog".into(),
            TestInfo::new(
                "ECOG Performance Status Assessment",
                "Functional status evaluation",
                Urgency::Low,
                Turnaround::immediate(),
                CostTier::Low,
            ),
        );

        map
    }

    fn default_conditions() -> BTreeMap<String, ConditionInfo> {
        let info = |documentation: &str, urgency: Urgency, time: Turnaround| ConditionInfo {
            documentation: documentation.into(),
            urgency,
            time_to_obtain: time,
        };

        let mut map = BTreeMap::new();

        map.insert(
            "diabetes".into(),
            info(
                "Diabetes mellitus diagnosis and management",
                Urgency::Medium,
                Turnaround::days(1.0, 2.0),
            ),
        );
        map.insert(
            "hypertension".into(),
            info(
                "Hypertension diagnosis and management",
                Urgency::Medium,
                Turnaround::days(1.0, 2.0),
            ),
        );
        map.insert(
            "heart_disease".into(),
            info("Cardiac history and current status", Urgency::High, Turnaround::days(2.0, 3.0)),
        );
        map.insert(
            "lung_disease".into(),
            info("Pulmonary history and current status", Urgency::High, Turnaround::days(2.0, 3.0)),
        );

        map
    }
}

/// First entry (in key order) whose keyword matches `name`.
fn find_by_keyword<'a, T>(table: &'a BTreeMap<String, T>, name: &str) -> Option<&'a T> {
    table
        .iter()
        .find(|(keyword, _)| keyword_matches(name, keyword))
        .map(|(_, info)| info)
}

/// A keyword matches a name when it equals one of the name's tokens, or when
/// it has at least four characters and occurs in the name with punctuation
/// and spacing removed ("PD-L1 expression" matches "pdl1").
fn keyword_matches(name: &str, keyword: &str) -> bool {
    let name = name.to_lowercase();
    let keyword: String = keyword.chars().filter(|c| c.is_alphanumeric()).collect();
    if keyword.is_empty() {
        return false;
    }

    if name
        .split(|c: char| !c.is_alphanumeric())
        .any(|token| token == keyword)
    {
        return true;
    }

    let joined: String = name.chars().filter(|c| c.is_alphanumeric()).collect();
    keyword.chars().count() >= 4 && joined.contains(&keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turnaround_parse_and_display() {
        let t: Turnaround = "3-5 days".parse().unwrap();
        assert_eq!(t, Turnaround::days(3.0, 5.0));
        assert_eq!(t.to_string(), "3-5 days");
        assert_eq!(t.max_days(), 5.0);

        let t: Turnaround = "1-2 hours".parse().unwrap();
        assert!((t.max_days() - 2.0 / 24.0).abs() < 1e-12);

        let t: Turnaround = "Immediate".parse().unwrap();
        assert_eq!(t.max_days(), 0.0);
        assert_eq!(t.to_string(), "Immediate");

        let t: Turnaround = "2 weeks".parse().unwrap();
        assert_eq!(t.max_days(), 14.0);

        assert!("soon".parse::<Turnaround>().is_err());
        assert!("5-3 days".parse::<Turnaround>().is_err());
        assert!("3-5 fortnights".parse::<Turnaround>().is_err());
    }

    #[test]
    fn test_turnaround_rejects_non_finite() {
        for text in ["nan days", "inf days", "1-inf days", "NaN-2 hours", "infinity weeks"] {
            let err = text.parse::<Turnaround>().unwrap_err();
            assert!(
                matches!(err, CatalogError::InvalidTurnaround(ref s) if s == text),
                "{} should be rejected",
                text
            );
        }
    }

    #[test]
    fn test_cost_tier() {
        assert_eq!("$$$".parse::<CostTier>().unwrap(), CostTier::High);
        assert_eq!(CostTier::VeryHigh.to_string(), "$$$$");
        assert!("€".parse::<CostTier>().is_err());
    }

    #[test]
    fn test_keyword_matching() {
        let catalog = GapCatalog::default();

        assert_eq!(catalog.biomarker("HER2").unwrap().test_name, "HER2 IHC/ISH");
        assert_eq!(catalog.biomarker("PD-L1 expression").unwrap().test_name, "PD-L1 IHC Testing");
        assert_eq!(catalog.biomarker("MSI-H").unwrap().test_name, "MSI/MMR Testing");
        assert!(catalog.biomarker("hemoglobin").is_none());

        assert_eq!(catalog.lab_test("ALT (SGPT)").unwrap().test_name, "Liver Function Tests");
        assert_eq!(catalog.lab_test("Total bilirubin").unwrap().test_name, "Liver Function Tests");
        // Short keywords only match whole tokens
        assert!(catalog.lab_test("breast density").is_none());

        assert_eq!(
            catalog.condition("Heart disease").unwrap().documentation,
            "Cardiac history and current status"
        );
        assert!(catalog.condition("Type 2 diabetes").is_some());
    }

    #[test]
    fn test_catalog_json_roundtrip_shape() {
        let json = r#"{
            "biomarkers": {
                "ntrk": {
                    "test_name": "NTRK Fusion Testing",
                    "description": "NTRK gene fusion analysis",
                    "urgency": "high",
                    "turnaround": "10-14 days",
                    "cost": "$$$"
                }
            }
        }"#;

        let catalog = GapCatalog::from_json(json).unwrap();
        let info = catalog.biomarker("NTRK fusion").unwrap();
        assert_eq!(info.turnaround, Turnaround::days(10.0, 14.0));
        assert_eq!(info.cost, CostTier::High);
        assert!(catalog.lab_tests.is_empty());

        let bad = r#"{"biomarkers": {"x": {
            "test_name": "X", "description": "", "urgency": "high", "turnaround": "later", "cost": "$"
        }}}"#;
        assert!(GapCatalog::from_json(bad).is_err());
    }
}
