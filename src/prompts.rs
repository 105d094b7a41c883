//! Prompts for the judgment service.
//!
//! Callers can override the system prompt via
//! [`crate::config::ReviewConfig::system_prompt`]; the constant here is used
//! only when no override is provided. The reply contract (a single JSON object
//! with `decision`, `findings`, `reason`) is enforced on our side by
//! [`crate::pipeline::verdict::validate_reply`], whatever the prompt says.

/// Default system prompt for arbitration.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an automated document-review assistant for scanned application forms.
You receive the status of every template check that was run on one submission.
Return your final judgment as a single JSON object and nothing else.

Rules:
1. "decision" is exactly one of "PASS", "NEEDS_FIX", "REJECT".
2. For NEEDS_FIX, list every item the applicant must correct in "findings",
   an array of {"label": "...", "message": "..."} objects.
3. For REJECT, give a short, plain "reason" string.
4. Do not wrap the JSON in markdown fences. Do not add commentary."#;

/// Build the user message carrying the evidence summary.
pub fn judgment_request(payload_json: &str) -> String {
    format!(
        "Judge the submission from the data below. Return JSON only:\n{}",
        payload_json
    )
}
