//! Classification of realistic scan result payloads.

use pretty_assertions::assert_eq;
use scanner_disclosure::{Basis, Classification, ClassifierPolicy, classify_json};
use serde_json::{Value, json};

fn verdict(payload: Value) -> (Classification, u32, Basis) {
    let v = classify_json(&payload, &ClassifierPolicy::default());
    (v.classification, v.issues_count, v.basis)
}

#[test]
fn minimal_payloads() {
    let cases = [
        (json!({"violations": []}), Classification::Compliant, 0),
        (json!({"violations": ["a", "b", "c"]}), Classification::NonCompliant, 3),
        (json!({"score": 95}), Classification::Compliant, 0),
        (json!({"score": 40}), Classification::NonCompliant, 0),
        (json!({"status": "Passed"}), Classification::Compliant, 0),
        (json!({"issuesCount": 2}), Classification::Compliant, 2),
        (json!({}), Classification::NonCompliant, 0),
    ];
    for (payload, classification, issues) in cases {
        let (got, got_issues, _) = verdict(payload.clone());
        assert_eq!((got, got_issues), (classification, issues), "{payload}");
    }
}

#[test]
fn axe_style_payloads() {
    assert_eq!(
        verdict(json!({"violations": [], "passes": [{"id": "color-contrast"}]})),
        (Classification::Compliant, 0, Basis::Violations)
    );
    assert_eq!(
        verdict(json!({
            "violations": [
                {"id": "image-alt", "impact": "critical"},
                {"id": "label", "impact": "serious"},
                {"id": "link-name", "impact": "serious"}
            ],
            "score": 97
        })),
        (Classification::NonCompliant, 3, Basis::Violations)
    );
}

#[test]
fn summary_payloads() {
    assert_eq!(
        verdict(json!({"score": 90, "issuesCount": 12})),
        (Classification::Compliant, 12, Basis::Score)
    );
    assert_eq!(
        verdict(json!({"score": 89.9, "issuesCount": 1})),
        (Classification::NonCompliant, 1, Basis::Score)
    );
    assert_eq!(
        verdict(json!({"complianceStatus": "Passed", "issuesCount": 9})),
        (Classification::Compliant, 9, Basis::Status)
    );
    assert_eq!(
        verdict(json!({"status": "failed", "issues_count": 4})),
        (Classification::Compliant, 4, Basis::IssueCount)
    );
    assert_eq!(
        verdict(json!({"status": "failed", "issuesCount": 5})),
        (Classification::NonCompliant, 5, Basis::Fallback)
    );
}

#[test]
fn junk_payloads_are_non_compliant() {
    for payload in [
        json!(null),
        json!("compliant"),
        json!([1, 2, 3]),
        json!({}),
        json!({"violations": "none", "score": "high"}),
    ] {
        let (classification, issues, basis) = verdict(payload.clone());
        assert_eq!(classification, Classification::NonCompliant, "{payload}");
        assert_eq!(issues, 0, "{payload}");
        assert_eq!(basis, Basis::Fallback, "{payload}");
    }
}
