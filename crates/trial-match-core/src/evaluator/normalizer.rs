//! Clinical value normalizer.
//!
//! Handles:
//! - Enum synonym folding (pos→positive, yes→true, m→male)
//! - Analyte-aware unit conversion (glucose mg/dL→mmol/L, creatinine mg/dL→µmol/L)
//! - General conversion of unambiguous units (g/dL→g/L, mEq/L→mmol/L)

use std::collections::HashMap;

use tracing::debug;

/// Normalizer for categorical values and lab units.
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Synonym map: lowercase spelling → canonical value
    enum_synonyms: HashMap<String, String>,
    /// Analyte conversions, checked in order: (analyte keyword, unit → (standard_unit, multiplier))
    analyte_conversions: Vec<(String, HashMap<String, (String, f64)>)>,
    /// Context-free conversions: unit → (standard_unit, multiplier)
    unit_conversions: HashMap<String, (String, f64)>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    /// Create a new normalizer with default mappings.
    pub fn new() -> Self {
        Self {
            enum_synonyms: Self::default_enum_synonyms(),
            analyte_conversions: Self::default_analyte_conversions(),
            unit_conversions: Self::default_unit_conversions(),
        }
    }

    /// Normalize a categorical value. Unknown values pass through trimmed
    /// and lowercased.
    pub fn normalize_enum(&self, value: &str) -> String {
        let lower = value.trim().to_lowercase();
        self.enum_synonyms.get(&lower).cloned().unwrap_or(lower)
    }

    /// Convert `value` in `unit` to the standard unit for `analyte`.
    ///
    /// `analyte` is free text (a predicate field or observation name); it is
    /// matched against the analyte keywords by substring. Ambiguous or
    /// unknown units leave the value unchanged.
    pub fn normalize_unit(&self, value: f64, unit: &str, analyte: Option<&str>) -> (f64, String) {
        let unit_key = canonical_unit_key(unit);
        if unit_key.is_empty() {
            return (value, String::new());
        }

        if let Some((keyword, conversions)) = analyte.and_then(|a| self.analyte_table([a])) {
            if let Some((standard, multiplier)) = conversions.get(&unit_key) {
                debug!(analyte = %keyword, from = %unit, to = %standard, multiplier, "unit converted");
                return (value * multiplier, standard.clone());
            }
        }

        match self.unit_conversions.get(&unit_key) {
            Some((standard, multiplier)) => (value * multiplier, standard.clone()),
            None => {
                debug!(unit = %unit, analyte = ?analyte, "no unit conversion, value left unchanged");
                (value, unit.trim().to_string())
            }
        }
    }

    /// First analyte keyword found in `contexts`, searched in order.
    ///
    /// Each context is tried against every keyword before moving to the
    /// next, so an earlier context wins even when a later one names an
    /// analyte that sits higher in the table.
    pub fn find_analyte<'a>(&self, contexts: impl IntoIterator<Item = &'a str>) -> Option<&str> {
        self.analyte_table(contexts).map(|(keyword, _)| keyword.as_str())
    }

    fn analyte_table<'a>(
        &self,
        contexts: impl IntoIterator<Item = &'a str>,
    ) -> Option<&(String, HashMap<String, (String, f64)>)> {
        contexts.into_iter().find_map(|context| {
            let context = context.to_lowercase();
            self.analyte_conversions
                .iter()
                .find(|(keyword, _)| context.contains(keyword.as_str()))
        })
    }

    /// Add a custom enum synonym.
    pub fn add_enum_synonym(&mut self, spelling: &str, canonical: &str) {
        self.enum_synonyms
            .insert(spelling.trim().to_lowercase(), canonical.trim().to_lowercase());
    }

    /// Add a custom context-free unit conversion.
    pub fn add_unit_conversion(&mut self, from: &str, to: &str, multiplier: f64) {
        self.unit_conversions
            .insert(canonical_unit_key(from), (to.to_string(), multiplier));
    }

    /// Add a conversion that only applies to one analyte.
    pub fn add_analyte_conversion(&mut self, analyte: &str, from: &str, to: &str, multiplier: f64) {
        let keyword = analyte.trim().to_lowercase();
        let entry = (canonical_unit_key(from), (to.to_string(), multiplier));

        match self
            .analyte_conversions
            .iter_mut()
            .find(|(existing, _)| *existing == keyword)
        {
            Some((_, conversions)) => {
                conversions.insert(entry.0, entry.1);
            }
            None => {
                self.analyte_conversions
                    .push((keyword, HashMap::from([entry])));
            }
        }
    }

    /// Default enum synonym mappings.
    fn default_enum_synonyms() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Test results
        map.insert("pos".into(), "positive".into());
        map.insert("+".into(), "positive".into());
        map.insert("positive".into(), "positive".into());
        map.insert("detected".into(), "positive".into());
        map.insert("neg".into(), "negative".into());
        map.insert("-".into(), "negative".into());
        map.insert("negative".into(), "negative".into());
        map.insert("not detected".into(), "negative".into());

        // Booleans
        map.insert("yes".into(), "true".into());
        map.insert("y".into(), "true".into());
        map.insert("true".into(), "true".into());
        map.insert("present".into(), "true".into());
        map.insert("no".into(), "false".into());
        map.insert("n".into(), "false".into());
        map.insert("false".into(), "false".into());
        map.insert("absent".into(), "false".into());

        // Gender
        map.insert("m".into(), "male".into());
        map.insert("man".into(), "male".into());
        map.insert("male".into(), "male".into());
        map.insert("f".into(), "female".into());
        map.insert("woman".into(), "female".into());
        map.insert("female".into(), "female".into());

        map
    }

    /// Default analyte-specific conversions to standard units.
    fn default_analyte_conversions() -> Vec<(String, HashMap<String, (String, f64)>)> {
        fn table(entries: &[(&str, &str, f64)]) -> HashMap<String, (String, f64)> {
            entries
                .iter()
                .map(|(from, to, mult)| (from.to_string(), (to.to_string(), *mult)))
                .collect()
        }

        vec![
            // Hematology
            (
                "hemoglobin".into(),
                table(&[("g/dl", "g/L", 10.0), ("g/l", "g/L", 1.0), ("mmol/l", "g/L", 16.11)]),
            ),
            ("hgb".into(), table(&[("g/dl", "g/L", 10.0), ("g/l", "g/L", 1.0)])),
            // Chemistry
            (
                "glucose".into(),
                table(&[("mg/dl", "mmol/L", 0.0555), ("mmol/l", "mmol/L", 1.0), ("g/l", "mmol/L", 5.55)]),
            ),
            (
                "creatinine".into(),
                table(&[
                    ("mg/dl", "umol/L", 88.4),
                    ("umol/l", "umol/L", 1.0),
                    ("mmol/l", "umol/L", 1000.0),
                ]),
            ),
            ("calcium".into(), table(&[("mg/dl", "mmol/L", 0.25), ("mmol/l", "mmol/L", 1.0)])),
            ("bilirubin".into(), table(&[("mg/dl", "umol/L", 17.1), ("umol/l", "umol/L", 1.0)])),
            ("total protein".into(), table(&[("g/dl", "g/L", 10.0), ("g/l", "g/L", 1.0)])),
            ("albumin".into(), table(&[("g/dl", "g/L", 10.0), ("g/l", "g/L", 1.0)])),
            ("cholesterol".into(), table(&[("mg/dl", "mmol/L", 0.0259), ("mmol/l", "mmol/L", 1.0)])),
            ("triglyceride".into(), table(&[("mg/dl", "mmol/L", 0.0113), ("mmol/l", "mmol/L", 1.0)])),
            ("urea nitrogen".into(), table(&[("mg/dl", "mmol/L", 0.357), ("mmol/l", "mmol/L", 1.0)])),
            ("bun".into(), table(&[("mg/dl", "mmol/L", 0.357), ("mmol/l", "mmol/L", 1.0)])),
            ("uric acid".into(), table(&[("mg/dl", "umol/L", 59.5), ("umol/l", "umol/L", 1.0)])),
            // Electrolytes
            ("sodium".into(), table(&[("meq/l", "mmol/L", 1.0), ("mmol/l", "mmol/L", 1.0)])),
            ("potassium".into(), table(&[("meq/l", "mmol/L", 1.0), ("mmol/l", "mmol/L", 1.0)])),
        ]
    }

    /// Default context-free conversions. No mg/dL entry: its standard unit
    /// depends on the analyte.
    fn default_unit_conversions() -> HashMap<String, (String, f64)> {
        let mut map = HashMap::new();

        // Mass concentration
        map.insert("g/dl".into(), ("g/L".into(), 10.0));
        map.insert("g/l".into(), ("g/L".into(), 1.0));

        // Molar concentration
        map.insert("mmol/l".into(), ("mmol/L".into(), 1.0));
        map.insert("umol/l".into(), ("umol/L".into(), 1.0));
        map.insert("meq/l".into(), ("mmol/L".into(), 1.0));

        map
    }
}

/// Lowercase, trim, and fold both micro sign code points to `u`.
fn canonical_unit_key(unit: &str) -> String {
    unit.trim()
        .to_lowercase()
        .replace(['\u{00B5}', '\u{03BC}'], "u")
}
