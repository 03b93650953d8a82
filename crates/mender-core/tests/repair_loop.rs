//! End-to-end scenarios for the repair orchestration engine, run against
//! scripted collaborators.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    failing, good_repair, passing, request, RecordingPublisher, ScriptedReasoner, ScriptedSandbox,
};
use mender_core::stages::testgen::GENERATED_SUITE_PATH;
use mender_core::{
    BugType, FixStatus, Orchestrator, ProgressSender, RunStatus, Terminal, Workspace,
};
use uuid::Uuid;

fn progress() -> (ProgressSender, tokio::sync::mpsc::UnboundedReceiver<mender_core::ProgressEvent>)
{
    ProgressSender::channel_with_interval(Uuid::new_v4(), Duration::ZERO)
}

fn workspace_with_target() -> (tempfile::TempDir, Workspace) {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(
        dir.path().join("src/calc.py"),
        "def scale(xs, n):\n    return xs * n\n",
    )
    .unwrap();
    let ws = Workspace::open(dir.path());
    (dir, ws)
}

#[tokio::test]
async fn green_initial_suite_ends_with_nothing_to_repair() {
    let reasoner = Arc::new(ScriptedReasoner::new("LOGIC", "{}", vec![good_repair()]));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![passing()]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::PushedToGithub));

    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone())
        .with_credential("token");
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::NothingToRepair);
    assert_eq!(sandbox.call_count(), 1);
    assert_eq!(publisher.call_count(), 0);
    drop(dir);
}

// Scenario A: type error -> classify -> localize -> repair -> validate ->
// execute -> publish.
#[tokio::test]
async fn happy_path_repairs_and_publishes() {
    let reasoner = Arc::new(ScriptedReasoner::new(
        "TYPE_ERROR",
        r#"{"file": "src/calc.py", "line": 2}"#,
        vec![good_repair()],
    ));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![
        failing("TypeError: can't multiply sequence by non-int"),
        passing(),
    ]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::PushedToGithub));

    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone())
        .with_credential("token");
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::Published);
    assert!(report.terminal.is_success());
    assert_eq!(publisher.call_count(), 1);
    assert_eq!(sandbox.call_count(), 2);

    let ledger = report.ledger.expect("ledger");
    assert_eq!(ledger.bug_type, BugType::TypeError);
    assert_eq!(ledger.target_file, "src/calc.py");
    assert_eq!(ledger.target_line, 2);
    assert_eq!(ledger.run_status, RunStatus::PushedToGithub);
    let fix = ledger.latest_fix().expect("fix");
    assert_eq!(fix.status, FixStatus::Success);
    assert!(fix.commit_summary.starts_with("[AI-AGENT]"));

    // The validated patch was applied to the working copy before execution.
    let patched = std::fs::read_to_string(dir.path().join("src/calc.py")).unwrap();
    assert!(patched.contains("int(n)"));
}

// Scenario B: three consecutive format failures terminate the run without
// ever reaching execution.
#[tokio::test]
async fn format_budget_exhaustion_never_reaches_execution() {
    let reasoner = Arc::new(ScriptedReasoner::new(
        "SYNTAX",
        r#"{"file": "src/calc.py", "line": 1}"#,
        // COMMIT marker present but missing the authorship tag every time.
        vec!["COMMIT: fixed it\n```python\nx = 1\n```"],
    ));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![failing("SyntaxError: invalid syntax")]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::PushedToGithub));

    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone())
        .with_credential("token");
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::FormatExhausted);
    // Only the initial pass; the structurally invalid patch never executed.
    assert_eq!(sandbox.call_count(), 1);
    assert_eq!(publisher.call_count(), 0);

    let ledger = report.ledger.expect("ledger");
    assert_eq!(ledger.format_attempts, 3);
    assert_eq!(ledger.fixes_applied.len(), 3);
    assert!(ledger
        .fixes_applied
        .iter()
        .all(|f| f.status == FixStatus::Failed));
    drop(dir);
}

// Scenario C: "collected 0 items" triggers the one-shot test-generation
// fallback, then the diagnosis cycle restarts against the generated suite.
#[tokio::test]
async fn no_tests_discovered_generates_suite_once_then_reclassifies() {
    let reasoner = Arc::new(ScriptedReasoner::new(
        "LOGIC",
        r#"{"file": "src/calc.py", "line": 2}"#,
        vec![good_repair()],
    ));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![
        failing("collected 0 items"),
        failing("collected 0 items"),
        passing(),
    ]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::PushedToGithub));

    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone())
        .with_credential("token");
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::Published);
    let ledger = report.ledger.expect("ledger");
    assert!(ledger.test_generated);
    // The fallback fired exactly once; the second cycle went straight to a
    // passing execution.
    assert!(dir.path().join(GENERATED_SUITE_PATH).exists());
    assert_eq!(sandbox.call_count(), 3);
}

// Logic-retry budget: execution failures re-enter classification at most
// three times, then the run aborts.
#[tokio::test]
async fn logic_budget_exhaustion_aborts_after_three_retries() {
    let reasoner = Arc::new(ScriptedReasoner::new(
        "LOGIC",
        r#"{"file": "src/calc.py", "line": 2}"#,
        vec![good_repair()],
    ));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![failing("assert 4 == 5")]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::PushedToGithub));

    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone())
        .with_credential("token");
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::RetriesExhausted);
    let ledger = report.ledger.expect("ledger");
    assert_eq!(ledger.retry_count, 3);
    assert_eq!(publisher.call_count(), 0);
    // Initial pass + four executions (three retried, one aborting).
    assert_eq!(sandbox.call_count(), 5);
    drop(dir);
}

// Scenario D: publication preconditions short-circuit before any network
// contact.
#[tokio::test]
async fn missing_credential_short_circuits_publication() {
    let reasoner = Arc::new(ScriptedReasoner::new(
        "LOGIC",
        r#"{"file": "src/calc.py", "line": 2}"#,
        vec![good_repair()],
    ));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![
        failing("assert 4 == 5"),
        passing(),
    ]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::PushedToGithub));

    // No credential configured.
    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone());
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::AuthFailed);
    assert_eq!(publisher.call_count(), 0);
    let ledger = report.ledger.expect("ledger");
    assert_eq!(ledger.run_status, RunStatus::GitAuthFailed);
    drop(dir);
}

// A remote rejection maps to the publish-failed terminal, not a fault.
#[tokio::test]
async fn remote_rejection_is_a_terminal_status_not_a_fault() {
    let reasoner = Arc::new(ScriptedReasoner::new(
        "LOGIC",
        r#"{"file": "src/calc.py", "line": 2}"#,
        vec![good_repair()],
    ));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![
        failing("assert 4 == 5"),
        passing(),
    ]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::GitPushFailed));

    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone())
        .with_credential("token");
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::PublishFailed);
    assert_eq!(publisher.call_count(), 1);
    drop(dir);
}

// Malformed localizer output degrades to unknown and the run still proceeds.
#[tokio::test]
async fn degraded_localization_still_repairs() {
    let reasoner = Arc::new(ScriptedReasoner::new(
        "LOGIC",
        "somewhere in the middle of the file, probably",
        vec![good_repair()],
    ));
    let sandbox = Arc::new(ScriptedSandbox::new(vec![
        failing("assert 4 == 5"),
        passing(),
    ]));
    let publisher = Arc::new(RecordingPublisher::new(RunStatus::PushedToGithub));

    let orchestrator = Orchestrator::new(reasoner.clone(), sandbox.clone(), publisher.clone())
        .with_credential("token");
    let (dir, ws) = workspace_with_target();
    let (mut tx, _rx) = progress();

    let report = orchestrator
        .run(Uuid::new_v4(), &request(), &ws, &mut tx)
        .await
        .expect("run");

    assert_eq!(report.terminal, Terminal::Published);
    let ledger = report.ledger.expect("ledger");
    assert_eq!(ledger.target_file, "unknown");
    assert_eq!(ledger.target_line, 0);
    // The unpatched tree was re-executed; no stray "unknown" file appeared.
    assert!(!dir.path().join("unknown").exists());
}
