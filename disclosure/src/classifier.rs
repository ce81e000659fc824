//! Compliance classifier for scan result payloads.
//!
//! Maps the scanner's opaque result payload onto a binary
//! [`Classification`] using ordered rules: structured violations beat a
//! numeric score, a score beats a textual status, and a status beats the
//! issue-count heuristic. The classifier is total: unrecognized payloads
//! fall through to `NonCompliant`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Classification;

/// Status strings (compared case-insensitively) that mean "compliant".
const COMPLIANT_STATUSES: &[&str] = &["compliant", "accessible", "pass", "passed"];

/// Tunable thresholds for the classifier rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierPolicy {
    /// Minimum score (0-100) that counts as compliant.
    #[serde(default = "default_compliant_score")]
    pub compliant_score: f64,

    /// Sites with fewer known issues than this are treated as compliant
    /// when nothing better is available.
    // Product policy inherited from the scanner widget; pending owner sign-off.
    #[serde(default = "default_lenient_issue_threshold")]
    pub lenient_issue_threshold: u32,
}

fn default_compliant_score() -> f64 {
    90.0
}

fn default_lenient_issue_threshold() -> u32 {
    5
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            compliant_score: default_compliant_score(),
            lenient_issue_threshold: default_lenient_issue_threshold(),
        }
    }
}

/// The fields of a result payload the classifier understands.
///
/// Fields with an unexpected JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanPayload {
    /// Length of the structured `violations` list, when one is present.
    pub violations: Option<usize>,
    pub score: Option<f64>,
    /// `status`, or `complianceStatus` as the widget names it.
    pub status: Option<String>,
    /// `issuesCount` / `issues_count`.
    pub issues_count: Option<u32>,
}

impl ScanPayload {
    pub fn from_json(value: &Value) -> Self {
        let violations = value
            .get("violations")
            .and_then(Value::as_array)
            .map(Vec::len);
        let score = value
            .get("score")
            .and_then(Value::as_f64)
            .filter(|score| score.is_finite());
        let status = ["status", "complianceStatus"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::to_string);
        let issues_count = ["issuesCount", "issues_count"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_u64))
            .map(|count| u32::try_from(count).unwrap_or(u32::MAX));

        Self {
            violations,
            score,
            status,
            issues_count,
        }
    }

    /// True when at least one recognized field is present.
    pub fn is_recognized(&self) -> bool {
        self.violations.is_some()
            || self.score.is_some()
            || self.status.is_some()
            || self.issues_count.is_some()
    }
}

/// Which rule produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    Violations,
    Score,
    Status,
    IssueCount,
    /// Nothing conclusive; defaulted to non-compliant.
    Fallback,
}

/// Result of classifying a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub classification: Classification,
    /// Number of issues found; 0 when the payload does not say.
    pub issues_count: u32,
    pub basis: Basis,
}

/// Classify a raw JSON payload.
pub fn classify_json(value: &Value, policy: &ClassifierPolicy) -> Verdict {
    classify(&ScanPayload::from_json(value), policy)
}

pub fn classify(payload: &ScanPayload, policy: &ClassifierPolicy) -> Verdict {
    if let Some(count) = payload.violations {
        let issues_count = u32::try_from(count).unwrap_or(u32::MAX);
        let classification = if issues_count == 0 {
            Classification::Compliant
        } else {
            Classification::NonCompliant
        };
        return Verdict {
            classification,
            issues_count,
            basis: Basis::Violations,
        };
    }

    let issues_count = payload.issues_count.unwrap_or(0);

    if let Some(score) = payload.score {
        let classification = if score >= policy.compliant_score {
            Classification::Compliant
        } else {
            Classification::NonCompliant
        };
        return Verdict {
            classification,
            issues_count,
            basis: Basis::Score,
        };
    }

    if payload
        .status
        .as_deref()
        .is_some_and(|status| is_compliant_status(status.trim()))
    {
        return Verdict {
            classification: Classification::Compliant,
            issues_count,
            basis: Basis::Status,
        };
    }

    let classification = infer_from_issues_count(payload.issues_count, policy);
    let basis = if classification.is_compliant() {
        Basis::IssueCount
    } else {
        Basis::Fallback
    };
    Verdict {
        classification,
        issues_count,
        basis,
    }
}

/// Issue-count heuristic used when no payload rule applies.
///
/// Unknown counts are never lenient.
pub fn infer_from_issues_count(
    issues_count: Option<u32>,
    policy: &ClassifierPolicy,
) -> Classification {
    match issues_count {
        Some(count) if count < policy.lenient_issue_threshold => Classification::Compliant,
        _ => Classification::NonCompliant,
    }
}

fn is_compliant_status(status: &str) -> bool {
    COMPLIANT_STATUSES
        .iter()
        .any(|known| known.eq_ignore_ascii_case(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn verdict(value: Value) -> (Classification, u32) {
        let v = classify_json(&value, &ClassifierPolicy::default());
        (v.classification, v.issues_count)
    }

    #[test]
    fn empty_violations_is_compliant() {
        assert_eq!(verdict(json!({"violations": []})), (Classification::Compliant, 0));
    }

    #[test]
    fn violations_are_counted() {
        assert_eq!(
            verdict(json!({"violations": ["a", "b", "c"]})),
            (Classification::NonCompliant, 3)
        );
    }

    #[test]
    fn score_threshold_is_inclusive() {
        assert_eq!(verdict(json!({"score": 95})), (Classification::Compliant, 0));
        assert_eq!(verdict(json!({"score": 90})), (Classification::Compliant, 0));
        assert_eq!(verdict(json!({"score": 89.9})), (Classification::NonCompliant, 0));
        assert_eq!(verdict(json!({"score": 40})), (Classification::NonCompliant, 0));
    }

    #[test]
    fn status_match_ignores_case() {
        assert_eq!(verdict(json!({"status": "Passed"})), (Classification::Compliant, 0));
        assert_eq!(verdict(json!({"status": "ACCESSIBLE"})), (Classification::Compliant, 0));
        assert_eq!(
            verdict(json!({"complianceStatus": "compliant"})),
            (Classification::Compliant, 0)
        );
    }

    #[test]
    fn low_issue_count_is_lenient() {
        assert_eq!(verdict(json!({"issuesCount": 2})), (Classification::Compliant, 2));
        assert_eq!(verdict(json!({"issuesCount": 5})), (Classification::NonCompliant, 5));
    }

    #[test]
    fn empty_payload_falls_back() {
        let v = classify_json(&json!({}), &ClassifierPolicy::default());
        assert_eq!(v.classification, Classification::NonCompliant);
        assert_eq!(v.issues_count, 0);
        assert_eq!(v.basis, Basis::Fallback);
        assert!(!ScanPayload::from_json(&json!({})).is_recognized());
    }

    #[test]
    fn violations_override_score() {
        let v = classify_json(
            &json!({"violations": [{"id": "color-contrast"}], "score": 99}),
            &ClassifierPolicy::default(),
        );
        assert_eq!(v.classification, Classification::NonCompliant);
        assert_eq!(v.basis, Basis::Violations);
    }

    #[test]
    fn score_overrides_status() {
        let v = classify_json(
            &json!({"score": 12, "status": "passed"}),
            &ClassifierPolicy::default(),
        );
        assert_eq!(v.classification, Classification::NonCompliant);
        assert_eq!(v.basis, Basis::Score);
    }

    #[test]
    fn unknown_status_still_uses_issue_heuristic() {
        let v = classify_json(
            &json!({"status": "failed", "issuesCount": 1}),
            &ClassifierPolicy::default(),
        );
        assert_eq!(v.classification, Classification::Compliant);
        assert_eq!(v.basis, Basis::IssueCount);
    }

    #[test]
    fn mistyped_fields_are_ignored() {
        let payload = ScanPayload::from_json(&json!({
            "violations": "none",
            "score": "95",
            "status": 1,
            "issuesCount": -3,
        }));
        assert_eq!(payload, ScanPayload::default());
        assert_eq!(
            classify(&payload, &ClassifierPolicy::default()).basis,
            Basis::Fallback
        );
    }

    #[test]
    fn policy_thresholds_are_honored() {
        let policy = ClassifierPolicy {
            compliant_score: 75.0,
            lenient_issue_threshold: 0,
        };
        assert_eq!(
            classify_json(&json!({"score": 80}), &policy).classification,
            Classification::Compliant
        );
        assert_eq!(
            classify_json(&json!({"issuesCount": 0}), &policy).classification,
            Classification::NonCompliant
        );
    }

    #[test]
    fn infer_without_count_is_non_compliant() {
        let policy = ClassifierPolicy::default();
        assert_eq!(infer_from_issues_count(None, &policy), Classification::NonCompliant);
        assert_eq!(infer_from_issues_count(Some(4), &policy), Classification::Compliant);
    }
}
