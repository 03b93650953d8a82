//! The per-run repair ledger and its closed vocabulary.
//!
//! The ledger is the single mutable record threaded through every stage of a
//! repair run. It is owned exclusively by the orchestrator; stages update it
//! through the explicit methods below rather than by open-ended field access,
//! so the additive invariants (counters only increase, the fix list only
//! grows, the test-generation latch flips at most once) live in one place.

use serde::{Deserialize, Serialize};

/// Ceiling on consecutive format-validation failures before the run aborts.
pub const MAX_FORMAT_ATTEMPTS: u32 = 3;

/// Ceiling on execution failures routed back into classification.
pub const MAX_LOGIC_RETRIES: u32 = 3;

/// Closed set of bug categories the classifier may produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugType {
    Linting,
    Syntax,
    Logic,
    TypeError,
    Import,
    Indentation,
}

impl BugType {
    /// Parse a model-produced token into a category.
    ///
    /// Anything outside the closed set coerces to [`BugType::Logic`]; the
    /// classifier corrects malformed output instead of retrying it.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_uppercase().as_str() {
            "LINTING" => BugType::Linting,
            "SYNTAX" => BugType::Syntax,
            "LOGIC" => BugType::Logic,
            "TYPE_ERROR" => BugType::TypeError,
            "IMPORT" => BugType::Import,
            "INDENTATION" => BugType::Indentation,
            _ => BugType::Logic,
        }
    }

    /// Canonical token for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            BugType::Linting => "LINTING",
            BugType::Syntax => "SYNTAX",
            BugType::Logic => "LOGIC",
            BugType::TypeError => "TYPE_ERROR",
            BugType::Import => "IMPORT",
            BugType::Indentation => "INDENTATION",
        }
    }
}

impl std::fmt::Display for BugType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a single fix record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FixStatus {
    PendingValidation,
    Validated,
    Failed,
    Success,
}

/// One proposed patch attempt in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FixRecord {
    /// File the patch targets.
    pub file: String,

    /// Bug category the classifier assigned.
    pub bug_type: BugType,

    /// Line coordinate (0 = unknown).
    pub line: u32,

    /// One-line commit summary carrying the authorship tag.
    pub commit_summary: String,

    /// Validation/execution status of this attempt.
    pub status: FixStatus,
}

/// Routing status written by stages and consumed by the router.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Initial state before any stage has reported.
    Pending,
    /// Format validation rejected the latest fix.
    FormattingFailed,
    /// Format validation accepted the latest fix.
    FormatValid,
    /// The sandbox reported a green suite.
    TestsPassed,
    /// The sandbox reported a failing suite.
    TestsFailed,
    /// Publication succeeded (PR opened or idempotently re-confirmed).
    PushedToGithub,
    /// Publication was attempted and rejected by the remote.
    GitPushFailed,
    /// Publication short-circuited: the ledger holds no fixes.
    NoFixesToPush,
    /// Publication short-circuited: no credential available.
    GitAuthFailed,
}

/// The mutable state record for one repair run.
///
/// Created once per run with counters at zero and empty sequences, mutated
/// additively until a terminal status is reached, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    /// Raw error log driving the current diagnosis cycle. Replaced on every
    /// re-entry into classification; never empty while the loop is active.
    pub error_message: String,

    /// Category assigned by the latest classification pass.
    pub bug_type: BugType,

    /// File coordinate from localization ("unknown" when degraded).
    pub target_file: String,

    /// Line coordinate from localization (0 = unknown).
    pub target_line: u32,

    /// Snapshot of `target_file` at the time repair was invoked.
    pub file_content: String,

    /// Full replacement body for `target_file`; overwritten per repair pass.
    pub proposed_fix: String,

    /// Append-only history of patch attempts. The last element is always the
    /// one under consideration by validation and execution.
    pub fixes_applied: Vec<FixRecord>,

    /// Consecutive format-validation failures. Ceiling: [`MAX_FORMAT_ATTEMPTS`].
    pub format_attempts: u32,

    /// Execution failures routed back to classification. Ceiling: [`MAX_LOGIC_RETRIES`].
    pub retry_count: u32,

    /// One-shot latch: flips true when the test-generation fallback has run.
    pub test_generated: bool,

    /// Routing status consumed by the router after each stage.
    pub run_status: RunStatus,
}

impl Ledger {
    /// Create a fresh ledger seeded with the initial failure logs.
    pub fn new(error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            bug_type: BugType::Logic,
            target_file: String::new(),
            target_line: 0,
            file_content: String::new(),
            proposed_fix: String::new(),
            fixes_applied: Vec::new(),
            format_attempts: 0,
            retry_count: 0,
            test_generated: false,
            run_status: RunStatus::Pending,
        }
    }

    /// Classification stage update.
    pub fn record_classification(&mut self, bug_type: BugType) {
        self.bug_type = bug_type;
    }

    /// Localization stage update.
    pub fn record_location(&mut self, file: impl Into<String>, line: u32) {
        self.target_file = file.into();
        self.target_line = line;
    }

    /// Repair stage update: overwrite the proposed patch and append a new
    /// pending fix record derived from the current coordinates.
    pub fn record_repair(&mut self, proposed_fix: String, commit_summary: String) {
        self.proposed_fix = proposed_fix;
        self.fixes_applied.push(FixRecord {
            file: if self.target_file.is_empty() {
                "unknown".to_string()
            } else {
                self.target_file.clone()
            },
            bug_type: self.bug_type,
            line: self.target_line,
            commit_summary,
            status: FixStatus::PendingValidation,
        });
    }

    /// Validation stage update on pass.
    pub fn mark_format_valid(&mut self) {
        if let Some(last) = self.fixes_applied.last_mut() {
            last.status = FixStatus::Validated;
        }
        self.run_status = RunStatus::FormatValid;
    }

    /// Validation stage update on failure. The only place `format_attempts`
    /// increases.
    pub fn mark_format_failed(&mut self) {
        if let Some(last) = self.fixes_applied.last_mut() {
            last.status = FixStatus::Failed;
        }
        self.format_attempts += 1;
        self.run_status = RunStatus::FormattingFailed;
    }

    /// Execution stage update on a green suite.
    pub fn mark_tests_passed(&mut self) {
        if let Some(last) = self.fixes_applied.last_mut() {
            last.status = FixStatus::Success;
        }
        self.run_status = RunStatus::TestsPassed;
    }

    /// Execution stage update on a failing suite. Replaces the error context
    /// with fresh logs, the feedback edge that lets the loop converge.
    pub fn mark_tests_failed(&mut self, fresh_logs: String) {
        if let Some(last) = self.fixes_applied.last_mut() {
            last.status = FixStatus::Failed;
        }
        self.error_message = fresh_logs;
        self.run_status = RunStatus::TestsFailed;
    }

    /// Router update when an execution failure is routed back to
    /// classification. The only place `retry_count` increases.
    pub fn note_logic_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Test-generation stage update. The latch never resets.
    pub fn mark_tests_generated(&mut self) {
        self.test_generated = true;
    }

    /// Publication stage update.
    pub fn record_publication(&mut self, status: RunStatus) {
        self.run_status = status;
    }

    /// Latest fix record under consideration, if any.
    pub fn latest_fix(&self) -> Option<&FixRecord> {
        self.fixes_applied.last()
    }
}
