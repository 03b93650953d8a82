//! Localization stage: raw error log -> (file, line) coordinate.

use serde::Deserialize;
use tracing::{info, warn};

use crate::domain::{Ledger, Result};
use crate::llm::Reasoner;

const LOCALIZER_INSTRUCTIONS: &str = "\
You are the localization stage of an autonomous code-repair system.
Your ONLY job is to extract the EXACT file path and line number where the
crash originated from the provided error log.

Rules:
1. Respond ONLY with a valid JSON object. No markdown code fences. Just raw JSON.
2. The JSON must have exactly two keys: \"file\" and \"line\".
3. \"file\" is a string holding the relative path.
4. \"line\" is an integer. If no line number is found, return 0.

Example output:
{\"file\": \"src/calculator.py\", \"line\": 10}";

/// Coordinate produced by localization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    /// The degraded coordinate used when parsing fails.
    pub fn unknown() -> Self {
        Self {
            file: "unknown".to_string(),
            line: 0,
        }
    }
}

#[derive(Deserialize)]
struct RawLocation {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<i64>,
}

/// Strip a leading/trailing markdown code fence, if the model added one
/// despite instructions.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Parse the strict two-field contract, degrading to `unknown`/0 on any
/// malformed response. A parse fault must never abort the pipeline.
pub fn parse_location(raw: &str) -> Location {
    let cleaned = strip_code_fence(raw);
    match serde_json::from_str::<RawLocation>(cleaned) {
        Ok(parsed) => Location {
            file: parsed.file.unwrap_or_else(|| "unknown".to_string()),
            line: parsed.line.unwrap_or(0).max(0) as u32,
        },
        Err(_) => {
            warn!(raw = %cleaned, "localizer returned unparseable JSON, degrading to unknown");
            Location::unknown()
        }
    }
}

/// Run localization and record the coordinate in the ledger.
pub async fn localize(reasoner: &dyn Reasoner, ledger: &mut Ledger) -> Result<Location> {
    let user = format!("Error Logs:\n\n{}", ledger.error_message);
    let location = match reasoner.generate(LOCALIZER_INSTRUCTIONS, &user).await {
        Ok(raw) => parse_location(&raw),
        // Localization failure never aborts the run; repair can still work
        // from the raw error log.
        Err(e) => {
            warn!(error = %e, "localizer call failed, degrading to unknown");
            Location::unknown()
        }
    };

    info!(file = %location.file, line = location.line, "error localized");
    ledger.record_location(location.file.clone(), location.line);
    Ok(location)
}
