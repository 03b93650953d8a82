//! Format validation stage: structural acceptance check on the latest fix.
//!
//! Validates shape only: commit-summary tag and non-empty patch. Semantic
//! correctness is exclusively the execution stage's job.

use tracing::info;

use crate::domain::Ledger;

/// Machine-readable prefix identifying automated authorship.
pub const COMMIT_TAG: &str = "[AI-AGENT]";

/// Verdict from format validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatVerdict {
    /// Whether the fix passed both structural rules.
    pub passed: bool,

    /// Violations that caused failure (empty if passed).
    pub violations: Vec<String>,
}

/// Check the structural rules against a commit summary and proposed patch.
pub fn check_format(commit_summary: &str, proposed_fix: &str) -> FormatVerdict {
    let mut violations = Vec::new();

    if !commit_summary.starts_with(COMMIT_TAG) {
        violations.push(format!(
            "commit summary '{commit_summary}' is missing the {COMMIT_TAG} prefix"
        ));
    }
    if proposed_fix.trim().is_empty() {
        violations.push("proposed patch is empty after trimming".to_string());
    }

    FormatVerdict {
        passed: violations.is_empty(),
        violations,
    }
}

/// Run format validation against the last fix record and update the ledger.
///
/// Pass: last record becomes `Validated`, status `FORMAT_VALID`.
/// Fail: last record becomes `Failed`, `format_attempts` increments, status
/// `FORMATTING_FAILED`. A ledger with no fix records fails outright.
pub fn validate(ledger: &mut Ledger) -> FormatVerdict {
    let Some(latest) = ledger.latest_fix() else {
        ledger.mark_format_failed();
        return FormatVerdict {
            passed: false,
            violations: vec!["no fix record to validate".to_string()],
        };
    };

    let verdict = check_format(&latest.commit_summary, &ledger.proposed_fix);
    if verdict.passed {
        info!("format validation passed");
        ledger.mark_format_valid();
    } else {
        info!(violations = ?verdict.violations, "format validation failed");
        ledger.mark_format_failed();
    }
    verdict
}
