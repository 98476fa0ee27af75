//! Predicate evaluation against patient features.
//!
//! Pipeline: Predicate → (Patient | Condition | Medication | Observation) lookup
//! → Normalization → Comparison → MatchOutcome
//!
//! Evaluation never fails. Missing facts, unsupported operators, type
//! mismatches and unparsable numbers all come back as an outcome with
//! `missing_data = true`.

mod normalizer;

pub use normalizer::*;

use tracing::trace;

use crate::models::{
    ClinicalEntry, MatchOutcome, Observation, ObservationValue, Operator, PatientFeatures,
    Predicate, PredicateValue, ResourceType,
};

/// Tolerance for numeric equality.
const EQ_EPSILON: f64 = 1e-9;

/// Evaluates single predicates against a patient's features.
#[derive(Debug, Clone, Default)]
pub struct PredicateEvaluator {
    normalizer: Normalizer,
}

impl PredicateEvaluator {
    /// Create an evaluator with the default normalization tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an evaluator with a customized normalizer.
    pub fn with_normalizer(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Get the normalizer for direct access.
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Evaluate one predicate.
    pub fn evaluate(&self, features: &PatientFeatures, predicate: &Predicate) -> MatchOutcome {
        let outcome = match predicate.resource_type() {
            ResourceType::Patient => self.evaluate_patient(features, predicate),
            ResourceType::Condition => {
                evaluate_entries(ResourceType::Condition, &features.conditions, predicate)
            }
            ResourceType::Medication => {
                evaluate_entries(ResourceType::Medication, &features.medications, predicate)
            }
            ResourceType::Observation => self.evaluate_observation(features, predicate),
        };

        trace!(
            predicate = %predicate.describe(),
            op = %predicate.operator(),
            matched = outcome.matched,
            missing_data = outcome.missing_data,
            "predicate evaluated"
        );
        outcome
    }

    fn evaluate_patient(&self, features: &PatientFeatures, predicate: &Predicate) -> MatchOutcome {
        let field = predicate.field().map(|f| f.trim().to_lowercase());

        match field.as_deref() {
            Some("age") => evaluate_age(features.age, predicate),
            Some("gender") | Some("sex") => self.evaluate_gender(features.gender.as_deref(), predicate),
            _ => MatchOutcome::missing(format!("Unknown patient field: {}", predicate.label())),
        }
    }

    fn evaluate_gender(&self, gender: Option<&str>, predicate: &Predicate) -> MatchOutcome {
        let Some(gender) = gender.filter(|g| !g.trim().is_empty()) else {
            return MatchOutcome::missing("Patient gender not available");
        };
        let gender = self.normalizer.normalize_enum(gender);
        let value = display_value(predicate);

        match predicate.operator() {
            Operator::Present => MatchOutcome::matched(format!("Patient gender is present: {}", gender)),
            Operator::Absent => MatchOutcome::failed(format!("Patient gender is present: {}", gender)),
            op @ (Operator::Eq | Operator::Ne) => {
                let Some(PredicateValue::Text(expected)) = predicate.value() else {
                    return MatchOutcome::missing(format!("Cannot compare gender with {}", value));
                };
                let equal = self.normalizer.normalize_enum(expected) == gender;

                match (op, equal) {
                    (Operator::Eq, true) => MatchOutcome::matched(format!(
                        "Patient gender {} matches required {}",
                        gender, value
                    )),
                    (Operator::Eq, false) => MatchOutcome::failed(format!(
                        "Patient gender {} does not match required {}",
                        gender, value
                    )),
                    (_, false) => MatchOutcome::matched(format!("Patient gender {} is not {}", gender, value)),
                    (_, true) => MatchOutcome::failed(format!(
                        "Patient gender {} matches excluded {}",
                        gender, value
                    )),
                }
            }
            op @ (Operator::In | Operator::NotIn) => {
                let Some(items) = predicate.value().and_then(PredicateValue::as_list) else {
                    return MatchOutcome::missing(format!("Invalid value format for {}: {}", op, value));
                };
                let names: Vec<&str> = items
                    .iter()
                    .filter_map(|item| match item {
                        PredicateValue::Text(text) => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if names.len() != items.len() {
                    return MatchOutcome::missing(format!("Cannot compare gender with {}", value));
                }
                let listed = names
                    .iter()
                    .any(|item| self.normalizer.normalize_enum(item) == gender);

                match (op, listed) {
                    (Operator::In, true) => MatchOutcome::matched(format!(
                        "Patient gender {} is in allowed list {}",
                        gender, value
                    )),
                    (Operator::In, false) => MatchOutcome::failed(format!(
                        "Patient gender {} is not in allowed list {}",
                        gender, value
                    )),
                    (_, false) => MatchOutcome::matched(format!(
                        "Patient gender {} is not in excluded list {}",
                        gender, value
                    )),
                    (_, true) => MatchOutcome::failed(format!(
                        "Patient gender {} is in excluded list {}",
                        gender, value
                    )),
                }
            }
            op @ (Operator::Ge | Operator::Le | Operator::Gt | Operator::Lt | Operator::Range) => {
                MatchOutcome::missing(format!("Unsupported operator for gender: {}", op))
            }
        }
    }

    fn evaluate_observation(&self, features: &PatientFeatures, predicate: &Predicate) -> MatchOutcome {
        let label = predicate.label();

        let Some(observation) = find_observation(features, predicate) else {
            return match predicate.operator() {
                Operator::Present => {
                    MatchOutcome::failed(format!("Observation '{}' is not present", label))
                }
                Operator::Absent => MatchOutcome::matched(format!("Observation '{}' is absent", label)),
                _ => MatchOutcome::missing(format!("Observation '{}' is not present", label)),
            };
        };

        let name = if observation.text.trim().is_empty() {
            label
        } else {
            observation.text.as_str()
        };

        match predicate.operator() {
            Operator::Present => MatchOutcome::matched(format!("Observation '{}' is present", name)),
            Operator::Absent => MatchOutcome::failed(format!("Observation '{}' is present", name)),
            _ => self.compare_observation(observation, name, predicate),
        }
    }

    fn compare_observation(
        &self,
        observation: &Observation,
        name: &str,
        predicate: &Predicate,
    ) -> MatchOutcome {
        let Some(actual) = &observation.value else {
            return MatchOutcome::missing(format!("Observation '{}' has no value", name));
        };
        let Some(expected) = predicate.value() else {
            return MatchOutcome::missing(format!("No value to compare for {}", predicate.describe()));
        };
        let op = predicate.operator();

        let actual_number = actual.as_number();
        if let (ObservationValue::Text(text), None) = (actual, actual_number) {
            return self.compare_categorical(name, text, op, expected);
        }
        let Some(actual) = actual_number else {
            return MatchOutcome::missing(format!("Cannot compare {} with {}", actual, expected));
        };

        let analyte = self
            .normalizer
            .find_analyte([predicate.field().unwrap_or_default(), observation.text.as_str()]);
        let standardize = |v: f64| match predicate.unit() {
            Some(unit) => self.normalizer.normalize_unit(v, unit, analyte).0,
            None => v,
        };

        match op {
            Operator::Range => match expected.as_range() {
                Some((low, high)) => {
                    let (low, high) = (standardize(low), standardize(high));
                    let inside = low <= actual && actual <= high;
                    MatchOutcome::from_bool(
                        inside,
                        format!(
                            "{}: {} is {} range [{}, {}]",
                            name,
                            format_number(actual),
                            if inside { "within" } else { "outside" },
                            format_number(low),
                            format_number(high)
                        ),
                    )
                }
                None => MatchOutcome::missing(format!("Invalid range format: {}", expected)),
            },
            Operator::In | Operator::NotIn => {
                let candidates: Vec<f64> = expected
                    .as_list()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(PredicateValue::as_number)
                    .map(standardize)
                    .collect();
                if candidates.is_empty() {
                    return MatchOutcome::missing(format!(
                        "Cannot compare {} with {}",
                        format_number(actual),
                        expected
                    ));
                }
                let listed = candidates.iter().any(|c| (c - actual).abs() < EQ_EPSILON);
                let holds = listed == (op == Operator::In);
                MatchOutcome::from_bool(
                    holds,
                    format!(
                        "{}: {} is {} {}",
                        name,
                        format_number(actual),
                        if listed { "in" } else { "not in" },
                        expected
                    ),
                )
            }
            _ => match expected.as_number() {
                Some(expected) => compare(name, actual, op, standardize(expected)),
                None => MatchOutcome::missing(format!(
                    "Cannot compare {} with {}",
                    format_number(actual),
                    expected
                )),
            },
        }
    }

    fn compare_categorical(
        &self,
        name: &str,
        actual: &str,
        op: Operator,
        expected: &PredicateValue,
    ) -> MatchOutcome {
        if expected.as_number().is_some() {
            return MatchOutcome::missing(format!(
                "Cannot compare text {} with number {}",
                actual, expected
            ));
        }

        let expected_text = match (op, expected.as_text()) {
            (Operator::Eq | Operator::Ne, Some(text)) => text,
            (Operator::Eq | Operator::Ne, None) => {
                return MatchOutcome::missing(format!("Cannot compare {} with {}", actual, expected));
            }
            _ => {
                return MatchOutcome::missing(format!(
                    "String comparison only supports == and != operators, got {}",
                    op
                ));
            }
        };

        let equal =
            self.normalizer.normalize_enum(actual) == self.normalizer.normalize_enum(&expected_text);
        let (a, e) = (actual, expected_text);
        match (op, equal) {
            (Operator::Eq, true) => MatchOutcome::matched(format!("{}: {} equals {}", name, a, e)),
            (Operator::Eq, false) => MatchOutcome::failed(format!("{}: {} does not equal {}", name, a, e)),
            (_, false) => MatchOutcome::matched(format!("{}: {} is not equal to {}", name, a, e)),
            (_, true) => MatchOutcome::failed(format!("{}: {} equals {}", name, a, e)),
        }
    }
}

fn evaluate_age(age: Option<u32>, predicate: &Predicate) -> MatchOutcome {
    let Some(age) = age else {
        return MatchOutcome::missing("Patient age not available");
    };
    let age = f64::from(age);

    match predicate.operator() {
        Operator::Present => MatchOutcome::matched(format!("Patient age is present: {} years", age)),
        Operator::Absent => MatchOutcome::failed(format!("Patient age is present: {} years", age)),
        Operator::Range => match predicate.value().and_then(PredicateValue::as_range) {
            Some((low, high)) => {
                let inside = low <= age && age <= high;
                MatchOutcome::from_bool(
                    inside,
                    format!(
                        "Patient age {} is {} range [{}, {}]",
                        age,
                        if inside { "within" } else { "outside" },
                        format_number(low),
                        format_number(high)
                    ),
                )
            }
            None => MatchOutcome::missing(format!("Invalid range format: {}", display_value(predicate))),
        },
        op @ (Operator::Eq | Operator::Ne | Operator::Ge | Operator::Le | Operator::Gt | Operator::Lt) => {
            match predicate.value().and_then(PredicateValue::as_number) {
                Some(expected) => compare("Patient age", age, op, expected),
                None => MatchOutcome::missing(format!(
                    "Cannot compare age with {}",
                    display_value(predicate)
                )),
            }
        }
        op @ (Operator::In | Operator::NotIn) => {
            MatchOutcome::missing(format!("Unsupported operator for age: {}", op))
        }
    }
}

/// Present/absent lookup shared by conditions and medications.
fn evaluate_entries(kind: ResourceType, entries: &[ClinicalEntry], predicate: &Predicate) -> MatchOutcome {
    let op = predicate.operator();
    if !matches!(op, Operator::Present | Operator::Absent) {
        return MatchOutcome::missing(format!("Unsupported operator for {}: {}", kind, op));
    }

    let by_code = predicate
        .code()
        .and_then(|code| entries.iter().find(|e| e.has_code(code)).map(|e| (e, code)));

    if let Some((entry, code)) = by_code {
        let evidence = format!("{} with code {} is present: {}", kind, code, entry.text);
        return MatchOutcome::from_bool(op == Operator::Present, evidence);
    }

    if let Some(field) = predicate.field() {
        let needle = field.trim().to_lowercase();
        if let Some(entry) = entries.iter().find(|e| e.text_contains(&needle)) {
            let evidence = format!("{} '{}' is present: {}", kind, field, entry.text);
            return MatchOutcome::from_bool(op == Operator::Present, evidence);
        }
    }

    let subject = match (predicate.field(), predicate.code()) {
        (Some(field), _) => format!("{} '{}'", kind, field),
        (None, Some(code)) => format!("{} with code {}", kind, code),
        (None, None) => kind.to_string(),
    };

    match op {
        Operator::Present => MatchOutcome::failed(format!("{} is not present", subject)),
        _ => MatchOutcome::matched(format!("{} is absent", subject)),
    }
}

/// Find an observation by code, then by field, searching lab results,
/// observations and vital signs in that order.
fn find_observation<'a>(features: &'a PatientFeatures, predicate: &Predicate) -> Option<&'a Observation> {
    let sources = || {
        features
            .lab_results
            .iter()
            .map(|o| (None::<&str>, o))
            .chain(features.observations.iter().map(|o| (None, o)))
            .chain(
                features
                    .vital_signs
                    .iter()
                    .map(|(key, o)| (Some(key.as_str()), o)),
            )
    };

    if let Some(code) = predicate.code() {
        if let Some((_, found)) = sources().find(|(_, o)| o.has_code(code)) {
            return Some(found);
        }
    }

    let needle = predicate.field()?.trim().to_lowercase();
    sources()
        .find(|(key, o)| {
            o.text.to_lowercase().contains(&needle)
                || key.is_some_and(|k| k.to_lowercase().replace('_', " ").contains(&needle))
        })
        .map(|(_, o)| o)
}

/// Numeric comparison with `context: actual op expected` evidence.
fn compare(context: &str, actual: f64, op: Operator, expected: f64) -> MatchOutcome {
    let a = format_number(actual);
    let e = format_number(expected);
    let equal = (actual - expected).abs() < EQ_EPSILON;

    match op {
        Operator::Eq if equal => MatchOutcome::matched(format!("{}: {} equals {}", context, a, e)),
        Operator::Eq => MatchOutcome::failed(format!("{}: {} does not equal {}", context, a, e)),
        Operator::Ne if !equal => MatchOutcome::matched(format!("{}: {} is not equal to {}", context, a, e)),
        Operator::Ne => MatchOutcome::failed(format!("{}: {} equals {}", context, a, e)),
        Operator::Ge if actual >= expected => MatchOutcome::matched(format!("{}: {} >= {}", context, a, e)),
        Operator::Ge => MatchOutcome::failed(format!("{}: {} < {}", context, a, e)),
        Operator::Le if actual <= expected => MatchOutcome::matched(format!("{}: {} <= {}", context, a, e)),
        Operator::Le => MatchOutcome::failed(format!("{}: {} > {}", context, a, e)),
        Operator::Gt if actual > expected => MatchOutcome::matched(format!("{}: {} > {}", context, a, e)),
        Operator::Gt => MatchOutcome::failed(format!("{}: {} <= {}", context, a, e)),
        Operator::Lt if actual < expected => MatchOutcome::matched(format!("{}: {} < {}", context, a, e)),
        Operator::Lt => MatchOutcome::failed(format!("{}: {} >= {}", context, a, e)),
        _ => MatchOutcome::missing(format!("Unsupported comparison operator: {}", op)),
    }
}

fn display_value(predicate: &Predicate) -> String {
    predicate
        .value()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".into())
}

/// Render a number with at most four decimals and no trailing zeros.
pub(crate) fn format_number(n: f64) -> String {
    let s = format!("{:.4}", n);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".into()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predicate(rt: ResourceType, field: &str, op: Operator) -> crate::models::PredicateBuilder {
        Predicate::builder(rt, op).field(field)
    }

    fn sample_features() -> PatientFeatures {
        let mut features = PatientFeatures {
            age: Some(54),
            gender: Some("F".into()),
            conditions: vec![
                ClinicalEntry::new("Malignant neoplasm of breast").with_code("254837009"),
                ClinicalEntry::new("Essential hypertension"),
            ],
            medications: vec![ClinicalEntry::new("Tamoxifen 20 MG Oral Tablet").with_code("198240")],
            lab_results: vec![
                Observation::new("Hemoglobin [Mass/volume] in Blood")
                    .with_code("718-7")
                    .with_number(125.0, Some("g/L")),
                Observation::new("HER2 [Presence] in Tissue").with_text("Pos"),
                Observation::new("Platelets"),
            ],
            observations: vec![Observation::new("ECOG performance status").with_text("1")],
            ..Default::default()
        };
        features
            .vital_signs
            .insert("body_weight".into(), Observation::new("Body weight").with_number(68.0, Some("kg")));
        features
    }

    #[test]
    fn test_age_comparisons() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        let p = predicate(ResourceType::Patient, "age", Operator::Ge).value(18).build().unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);
        assert_eq!(outcome.evidence, "Patient age: 54 >= 18");

        let p = predicate(ResourceType::Patient, "Age", Operator::Lt).value("50").build().unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(!outcome.matched && !outcome.missing_data);
        assert_eq!(outcome.evidence, "Patient age: 54 >= 50");
    }

    #[test]
    fn test_age_range_inclusive() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        let p = predicate(ResourceType::Patient, "age", Operator::Range)
            .value(vec![18, 54])
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);
        assert_eq!(outcome.evidence, "Patient age 54 is within range [18, 54]");
    }

    #[test]
    fn test_missing_age_is_missing_data() {
        let evaluator = PredicateEvaluator::new();
        let features = PatientFeatures::default();

        for op in [Operator::Present, Operator::Absent, Operator::Ge] {
            let mut builder = predicate(ResourceType::Patient, "age", op);
            if op == Operator::Ge {
                builder = builder.value(18);
            }
            let outcome = evaluator.evaluate(&features, &builder.build().unwrap());
            assert!(outcome.missing_data, "{:?} should be missing", op);
            assert!(!outcome.matched);
        }
    }

    #[test]
    fn test_gender_normalized() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        let p = predicate(ResourceType::Patient, "gender", Operator::Eq)
            .value("female")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);
        assert_eq!(outcome.evidence, "Patient gender female matches required female");

        let p = predicate(ResourceType::Patient, "gender", Operator::NotIn)
            .value(vec!["M", "other"])
            .build()
            .unwrap();
        assert!(evaluator.evaluate(&features, &p).matched);

        let p = predicate(ResourceType::Patient, "gender", Operator::Ge)
            .value("female")
            .build()
            .unwrap();
        assert!(evaluator.evaluate(&features, &p).missing_data);
    }

    #[test]
    fn test_unknown_patient_field() {
        let evaluator = PredicateEvaluator::new();
        let p = predicate(ResourceType::Patient, "weight", Operator::Ge)
            .value(50)
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&sample_features(), &p);
        assert!(outcome.missing_data);
        assert_eq!(outcome.evidence, "Unknown patient field: weight");
    }

    #[test]
    fn test_condition_by_code_and_field() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        let p = Predicate::builder(ResourceType::Condition, Operator::Present)
            .code("254837009")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);
        assert_eq!(
            outcome.evidence,
            "Condition with code 254837009 is present: Malignant neoplasm of breast"
        );

        let p = predicate(ResourceType::Condition, "Hypertension", Operator::Absent).build().unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(!outcome.matched && !outcome.missing_data);

        let p = predicate(ResourceType::Condition, "diabetes", Operator::Absent).build().unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);
        assert_eq!(outcome.evidence, "Condition 'diabetes' is absent");
    }

    #[test]
    fn test_code_miss_falls_back_to_field() {
        let evaluator = PredicateEvaluator::new();
        let p = Predicate::builder(ResourceType::Condition, Operator::Present)
            .code("38341003")
            .field("hypertension")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&sample_features(), &p);
        assert!(outcome.matched);
        assert_eq!(
            outcome.evidence,
            "Condition 'hypertension' is present: Essential hypertension"
        );
    }

    #[test]
    fn test_medication_unsupported_operator() {
        let evaluator = PredicateEvaluator::new();
        let p = predicate(ResourceType::Medication, "tamoxifen", Operator::Eq)
            .value("20")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&sample_features(), &p);
        assert!(outcome.missing_data);

        let p = predicate(ResourceType::Medication, "tamoxifen", Operator::Present).build().unwrap();
        assert!(evaluator.evaluate(&sample_features(), &p).matched);
    }

    #[test]
    fn test_observation_numeric_with_unit() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        // 10 g/dL normalizes to 100 g/L
        let p = predicate(ResourceType::Observation, "hemoglobin", Operator::Ge)
            .value(10.0)
            .unit("g/dL")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);
        assert_eq!(outcome.evidence, "Hemoglobin [Mass/volume] in Blood: 125 >= 100");

        let p = Predicate::builder(ResourceType::Observation, Operator::Range)
            .code("718-7")
            .value(vec![13.0, 17.0])
            .unit("g/dL")
            .build()
            .unwrap();
        assert!(!evaluator.evaluate(&features, &p).matched);
    }

    #[test]
    fn test_observation_categorical() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        let p = predicate(ResourceType::Observation, "HER2", Operator::Eq)
            .value("positive")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);

        let p = predicate(ResourceType::Observation, "HER2", Operator::Ge)
            .value("positive")
            .build()
            .unwrap();
        assert!(evaluator.evaluate(&features, &p).missing_data);

        // Numeric text compares numerically
        let p = predicate(ResourceType::Observation, "ECOG", Operator::Le)
            .value(1)
            .build()
            .unwrap();
        assert!(evaluator.evaluate(&features, &p).matched);
    }

    #[test]
    fn test_observation_not_found() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        let p = predicate(ResourceType::Observation, "PD-L1", Operator::Present).build().unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(!outcome.matched && !outcome.missing_data);
        assert!(outcome.denotes_not_present());

        let p = predicate(ResourceType::Observation, "PD-L1", Operator::Absent).build().unwrap();
        assert!(evaluator.evaluate(&features, &p).matched);

        let p = predicate(ResourceType::Observation, "creatinine", Operator::Le)
            .value(1.5)
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.missing_data);
        assert_eq!(outcome.evidence, "Observation 'creatinine' is not present");
    }

    #[test]
    fn test_observation_without_value() {
        let evaluator = PredicateEvaluator::new();
        let p = predicate(ResourceType::Observation, "platelets", Operator::Ge)
            .value(100)
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&sample_features(), &p);
        assert!(outcome.missing_data);
        assert_eq!(outcome.evidence, "Observation 'Platelets' has no value");
    }

    #[test]
    fn test_vital_sign_lookup_by_key() {
        let evaluator = PredicateEvaluator::new();
        let p = predicate(ResourceType::Observation, "body weight", Operator::Gt)
            .value(50)
            .build()
            .unwrap();
        assert!(evaluator.evaluate(&sample_features(), &p).matched);
    }

    #[test]
    fn test_type_mismatch_is_missing() {
        let evaluator = PredicateEvaluator::new();
        let p = predicate(ResourceType::Observation, "hemoglobin", Operator::Eq)
            .value("high")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&sample_features(), &p);
        assert!(outcome.missing_data);
        assert!(!outcome.matched);
    }

    #[test]
    fn test_text_observation_against_number_is_missing() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        for op in [Operator::Eq, Operator::Ne] {
            let p = predicate(ResourceType::Observation, "HER2", op).value(3).build().unwrap();
            let outcome = evaluator.evaluate(&features, &p);
            assert!(outcome.missing_data, "{} should be missing", op);
            assert!(!outcome.matched, "{} should not match", op);
            assert_eq!(outcome.evidence, "Cannot compare text Pos with number 3");
        }
    }

    #[test]
    fn test_gender_against_non_text_is_missing() {
        let evaluator = PredicateEvaluator::new();
        let features = sample_features();

        for op in [Operator::Eq, Operator::Ne] {
            let p = predicate(ResourceType::Patient, "gender", op).value(1).build().unwrap();
            let outcome = evaluator.evaluate(&features, &p);
            assert!(outcome.missing_data && !outcome.matched, "{} should be missing", op);
        }

        let p = predicate(ResourceType::Patient, "gender", Operator::In)
            .value(vec![1, 2])
            .build()
            .unwrap();
        assert!(evaluator.evaluate(&features, &p).missing_data);
    }

    #[test]
    fn test_unit_conversion_prefers_predicate_field() {
        let evaluator = PredicateEvaluator::new();
        let features = PatientFeatures {
            lab_results: vec![Observation::new("Albumin/Creatinine ratio").with_number(30.0, None)],
            ..Default::default()
        };
        assert_eq!(
            evaluator
                .normalizer()
                .find_analyte(["albumin", "Albumin/Creatinine ratio"]),
            Some("albumin")
        );

        // Albumin has no mg/dL conversion, so the threshold stays at 3
        let p = predicate(ResourceType::Observation, "albumin", Operator::Le)
            .value(3)
            .unit("mg/dL")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(!outcome.matched && !outcome.missing_data);
        assert_eq!(outcome.evidence, "Albumin/Creatinine ratio: 30 > 3");

        // A field naming no analyte falls back to the observation text
        let p = predicate(ResourceType::Observation, "ratio", Operator::Le)
            .value(3)
            .unit("mg/dL")
            .build()
            .unwrap();
        let outcome = evaluator.evaluate(&features, &p);
        assert!(outcome.matched);
        assert_eq!(outcome.evidence, "Albumin/Creatinine ratio: 30 <= 265.2");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(18.0), "18");
        assert_eq!(format_number(5.550000000000001), "5.55");
        assert_eq!(format_number(-0.00001), "0");
    }
}
