//! Routing decisions for the repair state machine.
//!
//! All budget and latch checks live here, as pure functions over the ledger,
//! so individual stages never duplicate them. The format-budget check is
//! evaluated strictly before the logic-budget and test-generation checks: a
//! structurally invalid patch can never be meaningfully executed.

use serde::{Deserialize, Serialize};

use crate::domain::{Ledger, RunStatus, MAX_FORMAT_ATTEMPTS, MAX_LOGIC_RETRIES};
use crate::sandbox::TestOutcome;

/// Terminal outcomes of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    /// The fix passed the suite and a pull request was opened.
    Published,
    /// The initial suite was already green; nothing to repair.
    NothingToRepair,
    /// Format validation failed [`MAX_FORMAT_ATTEMPTS`] times.
    FormatExhausted,
    /// Execution failed [`MAX_LOGIC_RETRIES`] times after re-classification.
    RetriesExhausted,
    /// Publication short-circuited: no fixes in the ledger.
    NoFixes,
    /// Publication short-circuited: no credential.
    AuthFailed,
    /// Publication was attempted and rejected.
    PublishFailed,
}

impl Terminal {
    /// Whether this terminal state counts as a successful run.
    pub fn is_success(&self) -> bool {
        matches!(self, Terminal::Published | Terminal::NothingToRepair)
    }
}

/// Route selected after format validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRoute {
    /// Structurally invalid, budget remaining: regenerate the patch.
    RetryRepair,
    /// Budget exhausted: terminate.
    Abort,
    /// Structurally valid: enter the sandbox.
    Execute,
}

/// Decide where to go after the validation stage.
pub fn after_validation(ledger: &Ledger) -> ValidationRoute {
    if ledger.run_status == RunStatus::FormattingFailed {
        if ledger.format_attempts < MAX_FORMAT_ATTEMPTS {
            ValidationRoute::RetryRepair
        } else {
            ValidationRoute::Abort
        }
    } else {
        ValidationRoute::Execute
    }
}

/// Route selected after a sandbox pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionRoute {
    /// Suite is green: publish.
    Publish,
    /// No tests discovered and the latch is unset: generate a suite.
    GenerateTests,
    /// Suite failed, budget remaining: re-enter classification.
    Reclassify,
    /// Budget exhausted: terminate.
    Abort,
}

/// Decide where to go after the execution stage.
///
/// Order matters: the one-shot test-generation check precedes the logic
/// budget so an empty suite is seeded rather than burning retries against it.
pub fn after_execution(ledger: &Ledger, outcome: &TestOutcome) -> ExecutionRoute {
    if outcome.passed {
        return ExecutionRoute::Publish;
    }
    if outcome.no_tests_discovered() && !ledger.test_generated {
        return ExecutionRoute::GenerateTests;
    }
    if ledger.retry_count < MAX_LOGIC_RETRIES {
        ExecutionRoute::Reclassify
    } else {
        ExecutionRoute::Abort
    }
}

/// Map a publication status to its terminal outcome.
pub fn terminal_for_publication(status: RunStatus) -> Terminal {
    match status {
        RunStatus::PushedToGithub => Terminal::Published,
        RunStatus::NoFixesToPush => Terminal::NoFixes,
        RunStatus::GitAuthFailed => Terminal::AuthFailed,
        _ => Terminal::PublishFailed,
    }
}
