//! Test-generation fallback stage.
//!
//! Invoked only when the sandbox reports that no tests were discovered and
//! the one-shot latch is still unset. Produces an initial suite so the
//! diagnosis cycle has something to converge against.

use std::path::Path;

use tracing::info;

use crate::domain::{Ledger, Result};
use crate::llm::Reasoner;
use crate::stages::repair::parse_repair;

const TESTGEN_INSTRUCTIONS: &str = "\
You are the test-generation stage of an autonomous code-repair system.
The target repository has no discoverable test suite. Write an initial suite
that exercises the repository's main entry points.

Rules:
1. Use pytest conventions (plain `test_*` functions, bare asserts).
2. Respond in this EXACT format:

COMMIT: [AI-AGENT] <short description>
```
<the complete content of the new test file>
```";

/// File the generated suite is written to, relative to the repository root.
pub const GENERATED_SUITE_PATH: &str = "test_generated_suite.py";

/// Generate an initial test suite, write it into the repository, and flip the
/// ledger latch.
///
/// An empty response still flips the latch: the fallback fires at most once
/// per run whether or not the model cooperated.
pub async fn generate_tests(
    reasoner: &dyn Reasoner,
    ledger: &mut Ledger,
    repo_path: &Path,
) -> Result<()> {
    let context = format!(
        "Repository file listing and most recent sandbox output:\n\n{}",
        ledger.error_message
    );
    let raw = reasoner.generate(TESTGEN_INSTRUCTIONS, &context).await?;

    // Reuse the repair contract parser; an absent code block falls back to
    // the provided default body.
    let parsed = parse_repair(&raw, "def test_placeholder():\n    assert True\n");
    let suite_path = repo_path.join(GENERATED_SUITE_PATH);
    tokio::fs::write(&suite_path, parsed.fixed_body.as_bytes()).await?;

    info!(path = %suite_path.display(), "initial test suite generated");
    ledger.mark_tests_generated();
    Ok(())
}
