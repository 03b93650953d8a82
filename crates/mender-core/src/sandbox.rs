//! Execution-stage boundary: run the repository's test suite in an isolated,
//! ephemeral container.
//!
//! The contract exposed to the orchestrator is deliberately narrow: a
//! repository path in, `{passed, logs}` out, within a bounded wall-clock
//! timeout. Timeouts and engine faults are reported as failures with
//! descriptive logs, never raised.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::domain::Result;

/// Default wall-clock ceiling for one sandbox pass.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of one sandboxed test pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    /// Whether the suite exited zero.
    pub passed: bool,

    /// Combined stdout/stderr on failure (empty on success).
    pub logs: String,
}

impl TestOutcome {
    /// Whether the failure logs match the "no tests discovered" signature
    /// that triggers the test-generation fallback.
    pub fn no_tests_discovered(&self) -> bool {
        !self.passed && logs_indicate_no_tests(&self.logs)
    }
}

/// Signature match for empty test collections across the supported runners.
pub fn logs_indicate_no_tests(logs: &str) -> bool {
    let lower = logs.to_lowercase();
    lower.contains("collected 0 items")
        || lower.contains("no tests ran")
        || lower.contains("ran 0 tests")
        || lower.contains("no test specified")
}

/// The external sandbox as seen by the orchestrator.
#[async_trait]
pub trait TestSandbox: Send + Sync {
    /// Run the suite against the repository snapshot at `repo_path`.
    async fn run_tests(&self, repo_path: &Path) -> Result<TestOutcome>;
}

/// Per-project container assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContainerPlan {
    image: &'static str,
    test_cmd: String,
}

/// Detect the repository's language and choose image + test command.
fn plan_container(repo_path: &Path) -> ContainerPlan {
    if repo_path.join("package.json").exists() {
        return ContainerPlan {
            image: "node:18-alpine",
            test_cmd: "npm install && npm test".to_string(),
        };
    }

    // Python fallback. Slim over alpine to avoid C-extension build failures.
    let mut test_cmd = String::new();
    if repo_path.join("requirements.txt").exists() {
        test_cmd.push_str("pip install -r requirements.txt -q && ");
    }
    test_cmd.push_str("pytest || python -m unittest discover");

    ContainerPlan {
        image: "python:3.11-slim",
        test_cmd,
    }
}

/// Docker-backed sandbox.
pub struct DockerSandbox {
    timeout: Duration,
}

impl DockerSandbox {
    /// Create a sandbox with the given per-pass timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for DockerSandbox {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl TestSandbox for DockerSandbox {
    async fn run_tests(&self, repo_path: &Path) -> Result<TestOutcome> {
        let abs = repo_path.canonicalize()?;
        let plan = plan_container(&abs);
        info!(image = plan.image, "starting sandboxed test pass");

        let child = Command::new("docker")
            .args(["run", "--rm", "-v"])
            .arg(format!("{}:/app", abs.display()))
            .args(["-w", "/app", plan.image, "/bin/sh", "-c", &plan.test_cmd])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(c) => c,
            // Engine faults degrade to a failing outcome with a descriptive
            // log; the router treats it as retriable evidence.
            Err(e) => {
                warn!(error = %e, "container engine unavailable");
                return Ok(TestOutcome {
                    passed: false,
                    logs: format!("Container Engine Error: {e}"),
                });
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(TestOutcome {
                    passed: false,
                    logs: format!("Container Engine Error: {e}"),
                })
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "sandbox pass timed out");
                return Ok(TestOutcome {
                    passed: false,
                    logs: "Execution Timeout: test suite exceeded the sandbox wall-clock limit \
                           (possible infinite loop)."
                        .to_string(),
                });
            }
        };

        if output.status.success() {
            Ok(TestOutcome {
                passed: true,
                logs: String::new(),
            })
        } else {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(TestOutcome {
                passed: false,
                logs: format!("{stdout}\n{stderr}"),
            })
        }
    }
}
