//! Result types produced by a review.
//!
//! A review fuses six independent checks. Each check yields one [`Evidence`]
//! record; the six together form an [`EvidenceSet`], which the verdict stage
//! turns into a [`Verdict`] plus [`Finding`]s. Everything is assembled into a
//! [`ReviewOutput`], which serialises to the JSON shape callers store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tri-state outcome of a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    NeedsFix,
    Reject,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::NeedsFix => "NEEDS_FIX",
            Verdict::Reject => "REJECT",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = ();

    /// Exact labels only. Anything else is the caller's problem to coerce.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PASS" => Ok(Verdict::Pass),
            "NEEDS_FIX" => Ok(Verdict::NeedsFix),
            "REJECT" => Ok(Verdict::Reject),
            _ => Err(()),
        }
    }
}

/// A human-readable deficiency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub label: String,
    pub message: String,
}

impl Finding {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            message: message.into(),
        }
    }
}

/// The six requirements of the form template, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Name,
    Photo,
    EssayLength,
    Consent,
    SignaturePage1,
    SignaturePage3,
}

impl Requirement {
    pub const ALL: [Requirement; 6] = [
        Requirement::Name,
        Requirement::Photo,
        Requirement::EssayLength,
        Requirement::Consent,
        Requirement::SignaturePage1,
        Requirement::SignaturePage3,
    ];

    /// Label used in findings and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Requirement::Name => "name",
            Requirement::Photo => "photo",
            Requirement::EssayLength => "essay length",
            Requirement::Consent => "consent",
            Requirement::SignaturePage1 => "signature (p1)",
            Requirement::SignaturePage3 => "signature (p3)",
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub satisfied: bool,
    /// Which strategy decided, e.g. "Digital Text Match" or "Trap Text: (인)".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Continuous score behind a visual decision.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Evidence {
    pub fn satisfied(method: impl Into<String>) -> Self {
        Self {
            satisfied: true,
            method: Some(method.into()),
            score: None,
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// The six evidence records of one review.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvidenceSet {
    pub name: Evidence,
    pub photo: Evidence,
    pub essay_length: Evidence,
    pub consent: Evidence,
    pub signature_page1: Evidence,
    pub signature_page3: Evidence,
}

impl EvidenceSet {
    pub fn get(&self, requirement: Requirement) -> &Evidence {
        match requirement {
            Requirement::Name => &self.name,
            Requirement::Photo => &self.photo,
            Requirement::EssayLength => &self.essay_length,
            Requirement::Consent => &self.consent,
            Requirement::SignaturePage1 => &self.signature_page1,
            Requirement::SignaturePage3 => &self.signature_page3,
        }
    }

    /// Requirements whose evidence is not satisfied, in evaluation order.
    pub fn failing(&self) -> Vec<Requirement> {
        Requirement::ALL
            .into_iter()
            .filter(|r| !self.get(*r).satisfied)
            .collect()
    }
}

/// Length of one numbered essay section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionLength {
    pub label: String,
    /// Character count (Unicode scalar values, not bytes).
    pub count: usize,
    pub satisfied: bool,
}

/// What the judgment service answered, after validation.
///
/// Kept verbatim for audit even when the final verdict overrides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRecord {
    pub decision: Verdict,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Timing and volume statistics for one review.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewStats {
    pub total_pages: usize,
    /// Rasteriser that produced the pages.
    pub render_backend: String,
    /// OCR items across all pages.
    pub ocr_items: usize,
    /// Pages for which digital text was available.
    pub digital_pages: usize,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub arbitration_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Top-level review result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOutput {
    pub verdict: Verdict,
    pub findings: Vec<Finding>,
    /// Present only when the verdict is REJECT and the service gave a reason.
    pub reason: Option<String>,
    /// AND of all six checks, before arbitration.
    pub rule_pass: bool,
    pub applicant_name: Option<String>,
    pub evidence: EvidenceSet,
    pub sections: Vec<SectionLength>,
    pub arbitration: Option<ArbitrationRecord>,
    pub stats: ReviewStats,
    /// Multi-line human-readable summary.
    pub summary: String,
}

impl ReviewOutput {
    /// Coarse pass/fail status: `"PASS"` iff the verdict is PASS.
    pub fn status(&self) -> &'static str {
        if self.verdict == Verdict::Pass {
            "PASS"
        } else {
            "FAIL"
        }
    }
}
