//! In-memory registry of active and recently finished runs.
//!
//! Lifecycle: created on submit, readable while streaming, evicted once a
//! terminal state has been recorded and the TTL has elapsed. Bounds memory
//! growth across many submissions and keeps concurrent runs isolated.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::domain::{MenderError, Result};
use crate::orchestrator::RepairRequest;
use crate::router::Terminal;

/// How long a terminal run remains readable before eviction.
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// One registered run.
#[derive(Debug, Clone)]
pub struct RunEntry {
    /// The original submission.
    pub request: RepairRequest,

    /// Terminal outcome, once reached.
    pub terminal: Option<Terminal>,

    finished_at: Option<Instant>,
}

impl RunEntry {
    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}

/// Thread-safe run registry.
pub struct RunStore {
    runs: Mutex<HashMap<Uuid, RunEntry>>,
    ttl: Duration,
}

impl RunStore {
    /// Create a store with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    /// Create a store with an explicit terminal-entry TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            runs: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Register a new submission, returning its run id.
    pub fn submit(&self, request: RepairRequest) -> Uuid {
        let run_id = Uuid::new_v4();
        let mut runs = self.runs.lock().expect("run store lock");
        runs.insert(
            run_id,
            RunEntry {
                request,
                terminal: None,
                finished_at: None,
            },
        );
        run_id
    }

    /// Look up a run. Evicts expired terminal entries as a side effect.
    pub fn get(&self, run_id: Uuid) -> Result<RunEntry> {
        let mut runs = self.runs.lock().expect("run store lock");
        Self::sweep_locked(&mut runs, self.ttl);
        runs.get(&run_id)
            .cloned()
            .ok_or(MenderError::RunNotFound(run_id))
    }

    /// Record a run's terminal outcome. The entry stays readable until the
    /// TTL expires.
    pub fn complete(&self, run_id: Uuid, terminal: Terminal) -> Result<()> {
        let mut runs = self.runs.lock().expect("run store lock");
        let entry = runs
            .get_mut(&run_id)
            .ok_or(MenderError::RunNotFound(run_id))?;
        entry.terminal = Some(terminal);
        entry.finished_at = Some(Instant::now());
        Ok(())
    }

    /// Number of registered runs (after sweeping expired entries).
    pub fn len(&self) -> usize {
        let mut runs = self.runs.lock().expect("run store lock");
        Self::sweep_locked(&mut runs, self.ttl);
        runs.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep_locked(runs: &mut HashMap<Uuid, RunEntry>, ttl: Duration) {
        // Active runs are never evicted.
        runs.retain(|_, entry| match entry.finished_at {
            Some(finished) => finished.elapsed() < ttl,
            None => true,
        });
    }
}

impl Default for RunStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RepairRequest {
        RepairRequest {
            repo_url: "https://github.com/acme/widget".to_string(),
            team_name: "acme".to_string(),
            leader_name: "ada".to_string(),
        }
    }

    #[test]
    fn test_submit_and_get() {
        let store = RunStore::new();
        let id = store.submit(request());

        let entry = store.get(id).expect("entry");
        assert!(!entry.is_terminal());
        assert_eq!(entry.request.team_name, "acme");
    }

    #[test]
    fn test_unknown_run_is_an_error() {
        let store = RunStore::new();
        assert!(matches!(
            store.get(Uuid::new_v4()),
            Err(MenderError::RunNotFound(_))
        ));
    }

    #[test]
    fn test_complete_marks_terminal() {
        let store = RunStore::new();
        let id = store.submit(request());
        store.complete(id, Terminal::Published).expect("complete");

        let entry = store.get(id).expect("entry");
        assert_eq!(entry.terminal, Some(Terminal::Published));
    }

    #[test]
    fn test_terminal_entries_expire_after_ttl() {
        let store = RunStore::with_ttl(Duration::ZERO);
        let id = store.submit(request());
        store.complete(id, Terminal::FormatExhausted).expect("complete");

        assert!(matches!(
            store.get(id),
            Err(MenderError::RunNotFound(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_active_runs_survive_sweeps() {
        let store = RunStore::with_ttl(Duration::ZERO);
        let id = store.submit(request());
        assert_eq!(store.len(), 1);
        assert!(store.get(id).is_ok());
    }
}
