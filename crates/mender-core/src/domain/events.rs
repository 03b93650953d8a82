//! Progress events streamed to observers during a repair run.
//!
//! The event boundary is append-only and one-directional: events are emitted
//! in the order stages complete and are never revised after emission.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::FixRecord;

/// Coarse run state surfaced to observers via `status` events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamStatus {
    Running,
    Passed,
    Failed,
}

/// Final score attached to a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunScore {
    /// Base points for completing the run.
    pub base: u32,

    /// Bonus for finishing under the speed threshold.
    pub speed_bonus: u32,

    /// Penalty for wasted attempts (currently always 0).
    pub efficiency_penalty: u32,

    /// Total after bonus and penalty.
    pub total: u32,
}

impl RunScore {
    /// Seconds under which a run earns the speed bonus.
    pub const SPEED_THRESHOLD_SECS: u64 = 300;

    /// Score a run from its wall-clock duration.
    pub fn from_duration_secs(secs: u64) -> Self {
        let base = 100;
        let speed_bonus = if secs < Self::SPEED_THRESHOLD_SECS { 10 } else { 0 };
        Self {
            base,
            speed_bonus,
            efficiency_penalty: 0,
            total: base + speed_bonus,
        }
    }
}

/// Kinds of observer-visible events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ProgressKind {
    /// Coarse run state changed.
    Status(StreamStatus),

    /// The run entered a numbered pipeline step.
    Step(u32),

    /// Human-readable progress line.
    Log(String),

    /// A fix record reached a terminal status worth surfacing.
    Fix(FixRecord),

    /// Final score for the run.
    Score(RunScore),
}

/// One event in a run's progress stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEvent {
    /// Which run this event belongs to.
    pub run_id: Uuid,

    /// Monotonically increasing sequence number within the run.
    pub seq: u64,

    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,

    /// Event payload.
    pub kind: ProgressKind,
}

impl ProgressEvent {
    /// Create a new event.
    pub fn new(run_id: Uuid, seq: u64, kind: ProgressKind) -> Self {
        Self {
            run_id,
            seq,
            timestamp: Utc::now(),
            kind,
        }
    }
}
