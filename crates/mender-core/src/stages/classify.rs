//! Classification stage: raw error log -> bug category.

use tracing::{info, warn};

use crate::domain::{BugType, Ledger, Result};
use crate::llm::Reasoner;

const CLASSIFIER_INSTRUCTIONS: &str = "\
You are the classification stage of an autonomous code-repair system.
Your ONLY job is to analyze error logs and categorize the bug into exactly one of:
- LINTING
- SYNTAX
- LOGIC
- TYPE_ERROR
- IMPORT
- INDENTATION

Rules:
1. Respond with ONLY the category name. Nothing else. No explanation.
2. If the log contains multiple issues, pick the most fundamental one.
3. A test failure without a clear error message is LOGIC.
4. Never invent a category outside the list.";

/// Coerce a raw model token into the closed category set.
///
/// Malformed output is corrected, not retried.
pub fn parse_category(raw: &str) -> BugType {
    BugType::from_token(raw)
}

/// Run classification and record the result in the ledger.
///
/// The only precondition is a non-empty `error_message`; the only side effect
/// is the ledger update.
pub async fn classify(reasoner: &dyn Reasoner, ledger: &mut Ledger) -> Result<BugType> {
    let user = format!(
        "Here are the error logs from the sandbox:\n\n{}",
        ledger.error_message
    );
    let raw = reasoner.generate(CLASSIFIER_INSTRUCTIONS, &user).await?;

    let bug_type = parse_category(&raw);
    if raw.trim().to_uppercase() != bug_type.as_str() {
        warn!(token = %raw.trim(), "classifier returned an out-of-set token, coercing to LOGIC");
    }
    info!(%bug_type, "bug classified");

    ledger.record_classification(bug_type);
    Ok(bug_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category_members() {
        assert_eq!(parse_category("IMPORT"), BugType::Import);
        assert_eq!(parse_category("TYPE_ERROR\n"), BugType::TypeError);
        assert_eq!(parse_category("syntax"), BugType::Syntax);
    }

    #[test]
    fn test_parse_category_coerces_garbage_to_logic() {
        assert_eq!(parse_category("I think this is a SyntaxError"), BugType::Logic);
        assert_eq!(parse_category(""), BugType::Logic);
        assert_eq!(parse_category("NULL_POINTER"), BugType::Logic);
    }
}
