//! Repair stage: diagnosis context -> commit summary + replacement file body.

use regex::Regex;
use std::sync::OnceLock;
use tracing::info;

use crate::domain::{Ledger, Result};
use crate::llm::Reasoner;

const REPAIR_INSTRUCTIONS: &str = "\
You are the repair stage of an autonomous code-repair system.
You will be given the bug type, location, error log, and current file content.

Your ONLY job is to fix the bug and return the complete, corrected file.

Rules:
1. Do NOT use JSON.
2. You MUST respond in this EXACT format:

COMMIT: [AI-AGENT] <short description of fix>
```
<the complete fixed file content>
```";

/// Default commit summary when the model omits the `COMMIT:` marker.
/// Guaranteed to satisfy the validator's prefix rule.
const DEFAULT_SUMMARY: &str = "[AI-AGENT] Attempted automated fix";

/// Parsed repair response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairResponse {
    pub commit_summary: String,
    pub fixed_body: String,
}

fn commit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"COMMIT:\s*(.+)").expect("valid commit regex"))
}

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Tolerates an optional language tag after the opening fence.
    RE.get_or_init(|| Regex::new(r"(?s)```[a-zA-Z0-9_+-]*\n(.*?)\n?```").expect("valid block regex"))
}

/// Extract the two-part textual contract from a raw model response.
///
/// Fallbacks keep this stage total: a missing `COMMIT:` marker yields a
/// default summary that passes format validation, and a missing code block
/// yields the untouched original body (a no-op patch).
pub fn parse_repair(raw: &str, original_body: &str) -> RepairResponse {
    let commit_summary = commit_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());

    let fixed_body = code_block_re()
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| original_body.to_string());

    RepairResponse {
        commit_summary,
        fixed_body,
    }
}

/// Run repair and record the proposed patch in the ledger.
///
/// All inputs may be defaulted or empty; repair tolerates a missing location
/// and works from the raw error log alone.
pub async fn repair(reasoner: &dyn Reasoner, ledger: &mut Ledger) -> Result<RepairResponse> {
    let context = format!(
        "Bug Type: {}\nLocation: {} (Line {})\nError Log: {}\nCurrent File Content:\n{}",
        ledger.bug_type,
        if ledger.target_file.is_empty() {
            "unknown"
        } else {
            &ledger.target_file
        },
        ledger.target_line,
        ledger.error_message,
        ledger.file_content,
    );

    let raw = reasoner.generate(REPAIR_INSTRUCTIONS, &context).await?;
    let response = parse_repair(&raw, &ledger.file_content);

    info!(summary = %response.commit_summary, "fix generated");
    ledger.record_repair(response.fixed_body.clone(), response.commit_summary.clone());
    Ok(response)
}
