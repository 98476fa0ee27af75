//! Human-readable data requests for missing criteria.
//!
//! Lookup order for observations:
//! 1. Exact lab keyword match
//! 2. Partial keyword match (keyword in field, or field in keyword). Keywords
//!    shorter than four characters must equal a whole token of the field.
//! 3. Panel patterns (CBC, LFT, BMP, CMP, tumor markers, ...)
//! 4. Generic `Need {Type} information for {field|code}`

use std::collections::HashMap;

use crate::models::{Predicate, ResourceType};

/// Catalog of data-request phrasings.
#[derive(Debug, Clone)]
pub struct DataRequestCatalog {
    /// Lab keyword → request, in match priority order
    lab_requests: Vec<(String, String)>,
    /// Panel pattern keywords → request
    panel_patterns: Vec<(Vec<String>, String)>,
    /// Condition code → display name
    condition_names: HashMap<String, String>,
}

impl Default for DataRequestCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DataRequestCatalog {
    /// Create a catalog with default phrasings.
    pub fn new() -> Self {
        Self {
            lab_requests: Self::default_lab_requests(),
            panel_patterns: Self::default_panel_patterns(),
            condition_names: Self::default_condition_names(),
        }
    }

    /// Phrase a request for the data a missing predicate needs.
    pub fn request_for(&self, predicate: &Predicate) -> String {
        let field = predicate.field();

        match predicate.resource_type() {
            ResourceType::Patient => match field.map(|f| f.trim().to_lowercase()).as_deref() {
                Some("age") => "Need patient age information".into(),
                Some("gender") | Some("sex") => "Need patient gender information".into(),
                Some(other) => format!("Need patient {} information", other),
                None => generic_request(predicate),
            },
            ResourceType::Condition => match (predicate.code(), field) {
                (Some(code), _) => format!("Need documentation of {}", self.condition_name(code)),
                (None, Some(field)) => format!("Need documentation of {} condition", field),
                (None, None) => generic_request(predicate),
            },
            ResourceType::Observation => field
                .and_then(|f| self.lab_request(f))
                .unwrap_or_else(|| generic_request(predicate)),
            ResourceType::Medication => match (field, predicate.code()) {
                (Some(field), _) => format!("Need medication history for {}", field),
                (None, Some(code)) => format!("Need medication history for code {}", code),
                (None, None) => generic_request(predicate),
            },
        }
    }

    /// Display name for a condition code, or `condition (code: X)`.
    pub fn condition_name(&self, code: &str) -> String {
        self.condition_names
            .get(code)
            .cloned()
            .unwrap_or_else(|| format!("condition (code: {})", code))
    }

    /// Look up a lab-specific request for an observation field.
    pub fn lab_request(&self, field: &str) -> Option<String> {
        let field = field.trim().to_lowercase();
        if field.is_empty() {
            return None;
        }

        if let Some((_, request)) = self.lab_requests.iter().find(|(key, _)| *key == field) {
            return Some(request.clone());
        }

        if let Some((_, request)) = self
            .lab_requests
            .iter()
            .find(|(key, _)| partial_match(&field, key))
        {
            return Some(request.clone());
        }

        self.panel_patterns
            .iter()
            .find(|(patterns, _)| patterns.iter().any(|p| field.contains(p.as_str())))
            .map(|(_, request)| request.clone())
    }

    /// Add or replace a lab request. New keywords are matched last.
    pub fn add_lab_request(&mut self, keyword: &str, request: &str) {
        let keyword = keyword.trim().to_lowercase();
        match self.lab_requests.iter_mut().find(|(key, _)| *key == keyword) {
            Some((_, existing)) => *existing = request.to_string(),
            None => self.lab_requests.push((keyword, request.to_string())),
        }
    }

    /// Add or replace a condition display name.
    pub fn add_condition_name(&mut self, code: &str, name: &str) {
        self.condition_names
            .insert(code.trim().to_string(), name.to_string());
    }

    /// Default lab request phrasings.
    fn default_lab_requests() -> Vec<(String, String)> {
        [
            // Biomarkers and performance status
            ("her2", "Need HER2 IHC/ISH testing"),
            ("ecog", "Need ECOG performance status assessment"),
            // Renal
            ("creatinine", "Need serum creatinine test"),
            // Hematology
            ("hemoglobin", "Need complete blood count (CBC) for hemoglobin"),
            ("hgb", "Need complete blood count (CBC) for hemoglobin"),
            ("wbc", "Need complete blood count (CBC) for white blood cells"),
            ("platelets", "Need complete blood count (CBC) for platelets"),
            // Liver
            ("alt", "Need liver function tests (LFTs) for ALT"),
            ("ast", "Need liver function tests (LFTs) for AST"),
            ("bilirubin", "Need liver function tests (LFTs) for bilirubin"),
            ("albumin", "Need serum albumin test"),
            ("egfr mutation", "Need EGFR mutation testing"),
            ("egfr", "Need estimated glomerular filtration rate (eGFR)"),
            // Tumor markers
            ("psa", "Need prostate-specific antigen (PSA) test"),
            ("ca125", "Need CA-125 tumor marker test"),
            ("cea", "Need carcinoembryonic antigen (CEA) test"),
            ("afp", "Need alpha-fetoprotein (AFP) test"),
            ("hcg", "Need human chorionic gonadotropin (hCG) test"),
            // Chemistry
            ("ldh", "Need lactate dehydrogenase (LDH) test"),
            ("alkaline phosphatase", "Need alkaline phosphatase test"),
            ("calcium", "Need serum calcium test"),
            ("sodium", "Need basic metabolic panel for sodium"),
            ("potassium", "Need basic metabolic panel for potassium"),
            ("chloride", "Need basic metabolic panel for chloride"),
            ("co2", "Need basic metabolic panel for CO2"),
            ("bun", "Need blood urea nitrogen (BUN) test"),
            ("glucose", "Need fasting glucose test"),
            ("a1c", "Need hemoglobin A1c test"),
            // Cardiac
            ("troponin", "Need troponin test"),
            ("bnp", "Need B-type natriuretic peptide (BNP) test"),
            // Coagulation
            ("d-dimer", "Need D-dimer test"),
            ("pt", "Need prothrombin time (PT) test"),
            ("ptt", "Need partial thromboplastin time (PTT) test"),
            ("inr", "Need international normalized ratio (INR) test"),
        ]
        .into_iter()
        .map(|(key, request)| (key.to_string(), request.to_string()))
        .collect()
    }

    /// Default panel patterns, checked after keyword lookups.
    fn default_panel_patterns() -> Vec<(Vec<String>, String)> {
        [
            (&["count", "cbc"][..], "Need complete blood count (CBC)"),
            (&["function", "lft"][..], "Need liver function tests (LFTs)"),
            (&["metabolic", "bmp"][..], "Need basic metabolic panel (BMP)"),
            (&["comprehensive", "cmp"][..], "Need comprehensive metabolic panel (CMP)"),
            (&["tumor", "marker"][..], "Need tumor marker testing"),
            (&["hormone"][..], "Need hormone testing"),
            (&["vitamin"][..], "Need vitamin level testing"),
            (&["thyroid"][..], "Need thyroid function tests"),
        ]
        .into_iter()
        .map(|(patterns, request)| {
            (
                patterns.iter().map(|p| p.to_string()).collect(),
                request.to_string(),
            )
        })
        .collect()
    }

    /// Default condition display names (one name per code).
    fn default_condition_names() -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("363418001".into(), "biliary tract cancer".into());
        map.insert("128462008".into(), "CNS metastases".into());
        map.insert("254637007".into(), "breast cancer".into());
        map.insert("254632001".into(), "lung cancer".into());

        map
    }
}

/// Short keywords ("ast", "pt") only match whole tokens of the field.
fn partial_match(field: &str, key: &str) -> bool {
    if key.chars().count() < 4 {
        return field
            .split(|c: char| !c.is_alphanumeric())
            .any(|token| token == key);
    }
    field.contains(key) || (field.chars().count() >= 4 && key.contains(field))
}

fn generic_request(predicate: &Predicate) -> String {
    format!(
        "Need {} information for {}",
        predicate.resource_type(),
        predicate.label()
    )
}
