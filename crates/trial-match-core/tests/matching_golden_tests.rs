//! Golden tests for the matching engine.
//!
//! Each case pairs a patient and a trial's criteria (both as JSON, the way
//! they arrive from upstream) with the expected score and bucket counts.

use trial_match_core::{MatchingEngine, PatientFeatures, Predicate};

/// Test case for one patient/trial pair.
struct GoldenCase {
    id: &'static str,
    patient: &'static str,
    predicates: &'static str,
    expected_score: f64,
    expected_eligible: bool,
    expected_matched: usize,
    expected_unmatched: usize,
    expected_missing: usize,
    expected_exclusions: usize,
}

const BILIARY_PATIENT: &str = r#"{
    "age": 52,
    "gender": "female",
    "conditions": [
        {"text": "Biliary tract cancer", "codes": [{"code": "363418001"}], "status": "active"}
    ],
    "lab_results": [
        {"text": "HER2", "value": "positive"},
        {"text": "Hemoglobin", "value": 132, "unit": "g/L"}
    ],
    "vitalSigns": {
        "heart_rate": {"text": "Heart rate", "value": 72, "unit": "/min"}
    }
}"#;

fn get_golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            id: "all-inclusions-matched",
            patient: BILIARY_PATIENT,
            predicates: r#"[
                {"type": "Patient", "field": "age", "op": ">=", "value": 18},
                {"type": "Patient", "field": "gender", "op": "==", "value": "F"},
                {"type": "Condition", "code": "363418001", "op": "present"},
                {"type": "Observation", "field": "HER2", "op": "==", "value": "pos"}
            ]"#,
            expected_score: 100.0,
            expected_eligible: true,
            expected_matched: 4,
            expected_unmatched: 0,
            expected_missing: 0,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "unfound-biomarker-penalized",
            patient: BILIARY_PATIENT,
            predicates: r#"[
                {"type": "Patient", "field": "age", "op": ">=", "value": 18, "weight": 5},
                {"type": "Patient", "field": "gender", "op": "==", "value": "female", "weight": 3},
                {"type": "Condition", "field": "diabetes", "op": "present", "weight": 2},
                {"type": "Observation", "field": "KRAS", "op": "present", "weight": 1}
            ]"#,
            // 100·8/11 − 0.25·(1/11)·100
            expected_score: 70.4545,
            expected_eligible: false,
            expected_matched: 2,
            expected_unmatched: 1,
            expected_missing: 1,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "exclusion-veto",
            patient: r#"{
                "age": 61,
                "conditions": [{"text": "Brain metastases", "codes": [{"code": "128462008"}]}]
            }"#,
            predicates: r#"[
                {"type": "Patient", "field": "age", "op": ">=", "value": 18},
                {"type": "Condition", "code": "128462008", "op": "present", "inclusion": false,
                 "reason": "Active CNS metastases"}
            ]"#,
            expected_score: 0.0,
            expected_eligible: false,
            expected_matched: 0,
            expected_unmatched: 0,
            expected_missing: 0,
            expected_exclusions: 1,
        },
        GoldenCase {
            id: "exclusion-not-triggered",
            patient: BILIARY_PATIENT,
            predicates: r#"[
                {"type": "Patient", "field": "age", "op": "range", "value": [18, 75]},
                {"type": "Condition", "code": "128462008", "op": "present", "inclusion": false}
            ]"#,
            expected_score: 100.0,
            expected_eligible: true,
            expected_matched: 1,
            expected_unmatched: 0,
            expected_missing: 0,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "no-predicates",
            patient: "{}",
            predicates: "[]",
            expected_score: 100.0,
            expected_eligible: true,
            expected_matched: 0,
            expected_unmatched: 0,
            expected_missing: 0,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "lab-unit-conversion",
            patient: BILIARY_PATIENT,
            predicates: r#"[
                {"type": "Observation", "field": "hemoglobin", "op": ">=", "value": 9, "unit": "g/dL"}
            ]"#,
            expected_score: 100.0,
            expected_eligible: true,
            expected_matched: 1,
            expected_unmatched: 0,
            expected_missing: 0,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "lab-threshold-failed",
            patient: BILIARY_PATIENT,
            predicates: r#"[
                {"type": "Observation", "field": "hemoglobin", "op": ">=", "value": 14, "unit": "g/dL"}
            ]"#,
            expected_score: 0.0,
            expected_eligible: false,
            expected_matched: 0,
            expected_unmatched: 1,
            expected_missing: 0,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "missing-age",
            patient: r#"{"gender": "female"}"#,
            predicates: r#"[
                {"type": "Patient", "field": "age", "op": ">=", "value": 18},
                {"type": "Patient", "field": "gender", "op": "in", "value": ["female", "male"]}
            ]"#,
            // 100·1/2 − 0.25·(1/2)·100
            expected_score: 37.5,
            expected_eligible: false,
            expected_matched: 1,
            expected_unmatched: 0,
            expected_missing: 1,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "vital-sign-range",
            patient: BILIARY_PATIENT,
            predicates: r#"[
                {"type": "Observation", "field": "heart rate", "op": "range", "value": [60, 100]}
            ]"#,
            expected_score: 100.0,
            expected_eligible: true,
            expected_matched: 1,
            expected_unmatched: 0,
            expected_missing: 0,
            expected_exclusions: 0,
        },
        GoldenCase {
            id: "string-value-unsupported-operator",
            patient: BILIARY_PATIENT,
            predicates: r#"[
                {"type": "Patient", "field": "age", "op": ">=", "value": 18, "weight": 3},
                {"type": "Observation", "field": "HER2", "op": ">=", "value": 2}
            ]"#,
            // 100·3/4 − 0.25·(1/4)·100
            expected_score: 68.75,
            expected_eligible: false,
            expected_matched: 1,
            expected_unmatched: 0,
            expected_missing: 1,
            expected_exclusions: 0,
        },
    ]
}

#[test]
fn test_golden_cases() {
    let engine = MatchingEngine::new();

    for case in get_golden_cases() {
        let features: PatientFeatures = serde_json::from_str(case.patient)
            .unwrap_or_else(|e| panic!("Case {}: bad patient JSON: {}", case.id, e));
        let predicates: Vec<Predicate> = serde_json::from_str(case.predicates)
            .unwrap_or_else(|e| panic!("Case {}: bad predicate JSON: {}", case.id, e));

        let result = engine.evaluate_trial_for(case.id, &features, &predicates);

        assert!(
            (result.score - case.expected_score).abs() < 0.01,
            "Case {}: score mismatch - expected {}, got {}",
            case.id, case.expected_score, result.score
        );
        assert_eq!(result.eligible, case.expected_eligible, "Case {}: eligibility mismatch", case.id);
        assert_eq!(
            result.matched_inclusions.len(), case.expected_matched,
            "Case {}: matched count mismatch", case.id
        );
        assert_eq!(
            result.unmatched_inclusions.len(), case.expected_unmatched,
            "Case {}: unmatched count mismatch", case.id
        );
        assert_eq!(
            result.missing_inclusions.len(), case.expected_missing,
            "Case {}: missing count mismatch", case.id
        );
        assert_eq!(
            result.exclusions_triggered.len(), case.expected_exclusions,
            "Case {}: exclusion count mismatch", case.id
        );
        assert_eq!(
            result.suggested_data.len(), case.expected_missing,
            "Case {}: one data request per missing criterion", case.id
        );
    }
}

#[test]
fn test_exclusion_reason_surfaces() {
    let case = get_golden_cases()
        .into_iter()
        .find(|c| c.id == "exclusion-veto")
        .unwrap();
    let features: PatientFeatures = serde_json::from_str(case.patient).unwrap();
    let predicates: Vec<Predicate> = serde_json::from_str(case.predicates).unwrap();

    let result = MatchingEngine::new().evaluate_trial(&features, &predicates);

    assert!(result.is_excluded());
    assert!(result.coverage_report.is_none());
    assert_eq!(result.total_inclusions, 1);
    assert!(result.reasons.iter().any(|r| r == "Excluded: Active CNS metastases"));
}

#[test]
fn test_missing_biomarker_requests_and_coverage() {
    let features: PatientFeatures = serde_json::from_str(BILIARY_PATIENT).unwrap();
    let predicates: Vec<Predicate> = serde_json::from_str(
        r#"[
            {"type": "Patient", "field": "age", "op": ">=", "value": 18},
            {"type": "Observation", "field": "HER2", "op": "==", "value": "positive"},
            {"type": "Observation", "field": "KRAS", "op": "present"},
            {"type": "Observation", "field": "ECOG", "op": "<=", "value": 1}
        ]"#,
    )
    .unwrap();

    let result = MatchingEngine::new().evaluate_trial(&features, &predicates);

    assert_eq!(result.matched_count, 2);
    assert_eq!(
        result.suggested_data,
        vec![
            "Need Observation information for KRAS".to_string(),
            "Need ECOG performance status assessment".to_string(),
        ]
    );
    // Each missing criterion carries its evidence
    assert_eq!(
        result.reasons[result.reasons.len() - 3..],
        [
            "Missing data for 2 criteria:",
            "  - Observation.KRAS: Observation 'KRAS' is not present",
            "  - Observation.ECOG: Observation 'ECOG' is not present",
        ]
    );

    let report = result.coverage_report.unwrap();
    assert_eq!(report.missing_biomarkers, vec!["KRAS"]);
    assert_eq!(report.missing_lab_tests, vec!["ECOG"]);
    assert_eq!(report.coverage_percentage, 50.0);
}
