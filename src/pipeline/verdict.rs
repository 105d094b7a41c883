//! Verdict engine: six evidence records → tri-state verdict + findings.
//!
//! ```text
//! rule_pass ──true──▶ PASS, no findings, no reason
//!     │
//!   false
//!     ▼
//! seeded findings ──▶ arbitration (optional) ──▶ NEEDS_FIX | REJECT
//! ```
//!
//! Arbitration can only move a failing submission between NEEDS_FIX and
//! REJECT. An arbiter PASS on a failing rule evaluation becomes NEEDS_FIX.

use crate::output::{ArbitrationRecord, EvidenceSet, Finding, Requirement, SectionLength, Verdict};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Final decision of one review.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    pub reason: Option<String>,
}

/// Deterministic finding for one failing requirement.
pub fn seeded_finding(requirement: Requirement, min_section_chars: usize) -> Finding {
    let message = match requirement {
        Requirement::Name => "Applicant name could not be found on page 1.".to_string(),
        Requirement::Photo => "No applicant photo detected in the photo box.".to_string(),
        Requirement::EssayLength => {
            format!("Each essay section needs at least {min_section_chars} characters.")
        }
        Requirement::Consent => "Consent box \"(yes)\" is not checked on page 3.".to_string(),
        Requirement::SignaturePage1 => "Signature missing next to the name on page 1.".to_string(),
        Requirement::SignaturePage3 => "Signature missing next to the name on page 3.".to_string(),
    };
    Finding::new(requirement.label(), message)
}

/// One seeded finding per failing requirement, in evaluation order.
pub fn seed_findings(evidence: &EvidenceSet, min_section_chars: usize) -> Vec<Finding> {
    evidence
        .failing()
        .into_iter()
        .map(|r| seeded_finding(r, min_section_chars))
        .collect()
}

/// Evidence summary sent to the judgment service.
///
/// `details` holds the six evidence records plus `applicant_name`
/// (null when no name was found).
pub fn arbitration_payload(
    applicant_name: Option<&str>,
    evidence: &EvidenceSet,
    sections: &[SectionLength],
) -> Value {
    let mut details = serde_json::to_value(evidence).unwrap_or_else(|_| json!({}));
    if let Value::Object(ref mut map) = details {
        map.insert("applicant_name".into(), json!(applicant_name));
    }
    json!({
        "details": details,
        "section_counts": sections,
    })
}

/// Parse and validate a raw judgment reply.
///
/// The JSON object is taken from the first `{` to the last `}`, so prose or
/// code fences around it are tolerated. `None` when no object can be parsed.
///
/// * `decision` not one of the three labels → NEEDS_FIX
/// * `findings` not a list, or no well-formed `{label, message}` entry → `seeded`
/// * `reason` kept only when it is a non-empty string
pub fn validate_reply(raw: &str, seeded: &[Finding]) -> Option<ArbitrationRecord> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }

    let value: Value = match serde_json::from_str(&raw[start..=end]) {
        Ok(v) => v,
        Err(e) => {
            warn!("Judgment reply is not valid JSON: {}", e);
            return None;
        }
    };
    let obj = value.as_object()?;

    let decision = obj
        .get("decision")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Verdict>().ok())
        .unwrap_or(Verdict::NeedsFix);

    let findings: Vec<Finding> = obj
        .get("findings")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(parse_finding).collect())
        .unwrap_or_default();
    let findings = if findings.is_empty() {
        debug!("Judgment reply has no usable findings; keeping seeded list");
        seeded.to_vec()
    } else {
        findings
    };

    let reason = obj
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Some(ArbitrationRecord {
        decision,
        findings,
        reason,
    })
}

fn parse_finding(v: &Value) -> Option<Finding> {
    let label = v.get("label")?.as_str()?.trim();
    let message = v.get("message")?.as_str()?.trim();
    if label.is_empty() || message.is_empty() {
        return None;
    }
    Some(Finding::new(label, message))
}

/// Fuse the rule evaluation with an optional validated arbitration record.
pub fn decide(
    rule_pass: bool,
    seeded: Vec<Finding>,
    arbitration: Option<&ArbitrationRecord>,
) -> Decision {
    if rule_pass {
        return Decision {
            verdict: Verdict::Pass,
            findings: Vec::new(),
            reason: None,
        };
    }

    let Some(record) = arbitration else {
        return Decision {
            verdict: Verdict::NeedsFix,
            findings: seeded,
            reason: None,
        };
    };

    let verdict = match record.decision {
        Verdict::Reject => Verdict::Reject,
        Verdict::NeedsFix => Verdict::NeedsFix,
        Verdict::Pass => {
            debug!("Arbiter answered PASS on a failing rule evaluation; using NEEDS_FIX");
            Verdict::NeedsFix
        }
    };

    let reason = if verdict == Verdict::Reject {
        record.reason.clone()
    } else {
        None
    };

    Decision {
        verdict,
        findings: record.findings.clone(),
        reason,
    }
}
