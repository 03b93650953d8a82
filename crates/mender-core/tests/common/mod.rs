//! Shared mock collaborators for orchestrator scenario tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use mender_core::publish::PublishContext;
use mender_core::{
    Publisher, Reasoner, RepairRequest, Result, RunStatus, TestOutcome, TestSandbox,
};

/// Reasoner scripted per call site. The call site is recognized from the
/// system instructions; repair responses are consumed in order, with the
/// last one repeating.
pub struct ScriptedReasoner {
    pub classify: String,
    pub localize: String,
    pub repair: Mutex<VecDeque<String>>,
    pub testgen: String,
    pub calls: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(classify: &str, localize: &str, repair: Vec<&str>) -> Self {
        Self {
            classify: classify.to_string(),
            localize: localize.to_string(),
            repair: Mutex::new(repair.into_iter().map(String::from).collect()),
            testgen: "COMMIT: [AI-AGENT] seed suite\n```python\ndef test_seed():\n    assert True\n```".to_string(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn generate(&self, system: &str, _user: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if system.contains("classification stage") {
            Ok(self.classify.clone())
        } else if system.contains("localization stage") {
            Ok(self.localize.clone())
        } else if system.contains("test-generation stage") {
            Ok(self.testgen.clone())
        } else {
            let mut queue = self.repair.lock().expect("repair queue");
            let response = if queue.len() > 1 {
                queue.pop_front().expect("nonempty")
            } else {
                queue.front().cloned().unwrap_or_default()
            };
            Ok(response)
        }
    }
}

/// Sandbox returning scripted outcomes in order; the last outcome repeats.
pub struct ScriptedSandbox {
    outcomes: Mutex<VecDeque<TestOutcome>>,
    pub calls: AtomicUsize,
}

impl ScriptedSandbox {
    pub fn new(outcomes: Vec<TestOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TestSandbox for ScriptedSandbox {
    async fn run_tests(&self, _repo_path: &Path) -> Result<TestOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut queue = self.outcomes.lock().expect("outcome queue");
        let outcome = if queue.len() > 1 {
            queue.pop_front().expect("nonempty")
        } else {
            queue.front().cloned().unwrap_or_else(|| TestOutcome {
                passed: false,
                logs: "no scripted outcome".to_string(),
            })
        };
        Ok(outcome)
    }
}

/// Publisher recording invocations and returning a fixed status.
pub struct RecordingPublisher {
    pub status: RunStatus,
    pub calls: AtomicUsize,
}

impl RecordingPublisher {
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, _ctx: &PublishContext) -> RunStatus {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.status
    }
}

pub fn passing() -> TestOutcome {
    TestOutcome {
        passed: true,
        logs: String::new(),
    }
}

pub fn failing(logs: &str) -> TestOutcome {
    TestOutcome {
        passed: false,
        logs: logs.to_string(),
    }
}

pub fn request() -> RepairRequest {
    RepairRequest {
        repo_url: "https://github.com/acme/widget".to_string(),
        team_name: "blue team".to_string(),
        leader_name: "ada".to_string(),
    }
}

/// A well-formed repair response patching `src/calc.py`.
pub fn good_repair() -> &'static str {
    "COMMIT: [AI-AGENT] cast operand before multiply\n```python\ndef scale(xs, n):\n    return [x * int(n) for x in xs]\n```"
}
