//! The repair orchestration engine.
//!
//! Sequences classification, localization, repair, format validation,
//! sandboxed execution, the one-shot test-generation fallback, and
//! publication, applying the routing decisions from [`crate::router`] and
//! streaming progress to the observer. Stages run strictly sequentially
//! within a run; independent runs may execute concurrently, each owning its
//! own ledger.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Ledger, MenderError, Result, RunScore, RunStatus, StreamStatus};
use crate::events::ProgressSender;
use crate::llm::Reasoner;
use crate::publish::{self, PublishContext, Publisher};
use crate::repo::Workspace;
use crate::router::{
    after_execution, after_validation, terminal_for_publication, ExecutionRoute, Terminal,
    ValidationRoute,
};
use crate::sandbox::TestSandbox;
use crate::stages;

/// A repair run submission.
#[derive(Debug, Clone)]
pub struct RepairRequest {
    /// Upstream repository URL (used for intake and publication).
    pub repo_url: String,

    /// Team identity feeding the branch naming rule.
    pub team_name: String,

    /// Operator identity feeding the branch naming rule.
    pub leader_name: String,
}

impl RepairRequest {
    /// Reject submissions that could never complete a run.
    pub fn validate(&self) -> Result<()> {
        if self.repo_url.trim().is_empty() {
            return Err(MenderError::InvalidRequest(
                "repository URL is empty".to_string(),
            ));
        }
        if self.team_name.trim().is_empty() || self.leader_name.trim().is_empty() {
            return Err(MenderError::InvalidRequest(
                "team and leader identities are required for branch naming".to_string(),
            ));
        }
        Ok(())
    }
}

/// Final report for a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier.
    pub run_id: Uuid,

    /// Terminal outcome.
    pub terminal: Terminal,

    /// The final ledger state (informational; discarded after reporting).
    pub ledger: Option<Ledger>,

    /// Score, when the run reached completion.
    pub score: Option<RunScore>,
}

/// The orchestrator: owns the external collaborators and drives runs.
pub struct Orchestrator {
    reasoner: Arc<dyn Reasoner>,
    sandbox: Arc<dyn TestSandbox>,
    publisher: Arc<dyn Publisher>,
    credential: Option<String>,
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborator boundaries.
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        sandbox: Arc<dyn TestSandbox>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            reasoner,
            sandbox,
            publisher,
            credential: None,
        }
    }

    /// Provide the hosting-API credential checked by the publication
    /// preconditions.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Execute a full repair run against an already-resolved working copy.
    pub async fn run(
        &self,
        run_id: Uuid,
        request: &RepairRequest,
        workspace: &Workspace,
        progress: &mut ProgressSender,
    ) -> Result<RunReport> {
        request.validate()?;

        let started = Instant::now();
        progress.status(StreamStatus::Running).await;
        progress.step(1).await;
        progress
            .log(format!("working copy ready at {}", workspace.path().display()))
            .await;

        // Initial sandbox pass: a green suite means there is nothing to do.
        progress.step(2).await;
        progress.log("running initial sandbox test pass").await;
        let initial = self.sandbox.run_tests(workspace.path()).await?;
        if initial.passed {
            progress.log("all tests passed, no bugs found").await;
            progress.status(StreamStatus::Passed).await;
            return Ok(RunReport {
                run_id,
                terminal: Terminal::NothingToRepair,
                ledger: None,
                score: None,
            });
        }

        progress.log("failures detected, entering diagnosis loop").await;
        progress.step(3).await;

        let mut ledger = Ledger::new(initial.logs);
        let terminal = self
            .repair_loop(&mut ledger, request, workspace, progress)
            .await?;

        progress.step(5).await;
        let score = RunScore::from_duration_secs(started.elapsed().as_secs());
        progress.score(score.clone()).await;
        progress
            .status(if terminal.is_success() {
                StreamStatus::Passed
            } else {
                StreamStatus::Failed
            })
            .await;

        info!(?terminal, run_id = %run_id, "run reached terminal state");
        Ok(RunReport {
            run_id,
            terminal,
            ledger: Some(ledger),
            score: Some(score),
        })
    }

    /// The bounded-retry diagnosis cycle. Returns the terminal outcome.
    async fn repair_loop(
        &self,
        ledger: &mut Ledger,
        request: &RepairRequest,
        workspace: &Workspace,
        progress: &mut ProgressSender,
    ) -> Result<Terminal> {
        loop {
            // CLASSIFY
            let bug_type = stages::classify(self.reasoner.as_ref(), ledger).await?;
            progress.log(format!("bug classified: {bug_type}")).await;

            // LOCALIZE (degrades to unknown, never aborts)
            let location = stages::localize(self.reasoner.as_ref(), ledger).await?;
            progress
                .log(format!(
                    "pinpointed to {} (line {})",
                    location.file, location.line
                ))
                .await;
            ledger.file_content = read_target(workspace.path(), &ledger.target_file).await;

            // REPAIR -> VALIDATE, with the format-retry budget.
            loop {
                progress.step(4).await;
                progress.log("generating code fix").await;
                stages::repair(self.reasoner.as_ref(), ledger).await?;

                let verdict = stages::validate(ledger);
                progress
                    .log(format!(
                        "format validation: {}",
                        if verdict.passed { "passed" } else { "failed" }
                    ))
                    .await;

                match after_validation(ledger) {
                    ValidationRoute::RetryRepair => continue,
                    ValidationRoute::Abort => {
                        warn!("format-retry budget exhausted");
                        return Ok(Terminal::FormatExhausted);
                    }
                    ValidationRoute::Execute => break,
                }
            }

            // EXECUTE against the patched tree.
            apply_patch(workspace.path(), ledger).await;
            let outcome = self.sandbox.run_tests(workspace.path()).await?;

            match after_execution(ledger, &outcome) {
                ExecutionRoute::Publish => {
                    ledger.mark_tests_passed();
                    progress.log("sandbox: tests passed").await;
                    if let Some(fix) = ledger.latest_fix() {
                        progress.fix(fix.clone()).await;
                    }
                    return Ok(self.publish(ledger, request, workspace, progress).await);
                }
                ExecutionRoute::GenerateTests => {
                    progress
                        .log("no tests discovered, generating an initial suite")
                        .await;
                    stages::generate_tests(self.reasoner.as_ref(), ledger, workspace.path())
                        .await?;
                    // Fresh diagnosis cycle against the generated suite.
                    ledger.mark_tests_failed(outcome.logs);
                    continue;
                }
                ExecutionRoute::Reclassify => {
                    progress.log("sandbox: tests failed, looping back").await;
                    ledger.mark_tests_failed(outcome.logs);
                    ledger.note_logic_retry();
                    continue;
                }
                ExecutionRoute::Abort => {
                    warn!("logic-retry budget exhausted");
                    ledger.mark_tests_failed(outcome.logs);
                    return Ok(Terminal::RetriesExhausted);
                }
            }
        }
    }

    /// PUBLISH: precondition short-circuits, then the remote protocol.
    async fn publish(
        &self,
        ledger: &mut Ledger,
        request: &RepairRequest,
        workspace: &Workspace,
        progress: &mut ProgressSender,
    ) -> Terminal {
        if let Some(status) = publish::check_preconditions(ledger, self.credential.as_deref()) {
            ledger.record_publication(status);
            progress
                .log(format!("publication skipped: {status:?}"))
                .await;
            return terminal_for_publication(status);
        }

        let branch = publish::branch_name(&request.team_name, &request.leader_name);
        let ctx = PublishContext {
            repo_url: request.repo_url.clone(),
            repo_path: workspace.path().to_path_buf(),
            branch: branch.clone(),
            commit_summary: ledger
                .latest_fix()
                .map(|f| f.commit_summary.clone())
                .unwrap_or_default(),
        };

        let status = self.publisher.publish(&ctx).await;
        ledger.record_publication(status);
        match status {
            RunStatus::PushedToGithub => {
                progress
                    .log(format!("pushed branch {branch} and opened pull request"))
                    .await;
            }
            other => {
                progress.log(format!("publication failed: {other:?}")).await;
            }
        }
        terminal_for_publication(status)
    }
}

/// Snapshot the localized file, tolerating a missing or unknown target.
async fn read_target(repo_path: &Path, target_file: &str) -> String {
    if target_file.is_empty() || target_file == "unknown" || target_file.contains("..") {
        return String::new();
    }
    tokio::fs::read_to_string(repo_path.join(target_file))
        .await
        .unwrap_or_default()
}

/// Write the validated patch over the target file.
///
/// Skipped when localization degraded to unknown; the sandbox then re-runs
/// against the unpatched tree and its logs feed the next classification pass.
async fn apply_patch(repo_path: &Path, ledger: &Ledger) {
    let target = &ledger.target_file;
    if target.is_empty() || target == "unknown" || target.contains("..") {
        return;
    }
    let path = repo_path.join(target);
    if let Some(parent) = path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    if let Err(e) = tokio::fs::write(&path, ledger.proposed_fix.as_bytes()).await {
        warn!(error = %e, file = %target, "failed to apply patch to working copy");
    }
}
