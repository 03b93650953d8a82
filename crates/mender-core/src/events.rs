//! Throttled progress emission.
//!
//! Stage transitions are converted into an ordered event stream for an
//! observer (UI, log sink). Emission is decoupled from stage execution by a
//! minimum inter-event delay so downstream consumers with rate limits are not
//! flooded. The delay is a throttle, not a correctness mechanism.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::{FixRecord, ProgressEvent, ProgressKind, RunScore, StreamStatus};

/// Default minimum spacing between consecutive events.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(250);

/// Sending half of a run's progress stream.
///
/// Events carry a per-run monotonically increasing sequence number and are
/// never revised after emission. A dropped receiver silently discards
/// subsequent events; progress emission must never fail a run.
pub struct ProgressSender {
    run_id: Uuid,
    tx: mpsc::UnboundedSender<ProgressEvent>,
    seq: u64,
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl ProgressSender {
    /// Create a stream for `run_id`, returning the sender and receiver halves.
    pub fn channel(run_id: Uuid) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        Self::channel_with_interval(run_id, DEFAULT_MIN_INTERVAL)
    }

    /// Like [`ProgressSender::channel`] with an explicit throttle interval.
    pub fn channel_with_interval(
        run_id: Uuid,
        min_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                run_id,
                tx,
                seq: 0,
                min_interval,
                last_emit: None,
            },
            rx,
        )
    }

    /// Emit one event, sleeping first if the previous emission was too recent.
    pub async fn emit(&mut self, kind: ProgressKind) {
        if let Some(last) = self.last_emit {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.seq += 1;
        let event = ProgressEvent::new(self.run_id, self.seq, kind);
        let _ = self.tx.send(event);
        self.last_emit = Some(Instant::now());
    }

    /// Convenience: coarse status change.
    pub async fn status(&mut self, status: StreamStatus) {
        self.emit(ProgressKind::Status(status)).await;
    }

    /// Convenience: numbered pipeline step.
    pub async fn step(&mut self, step: u32) {
        self.emit(ProgressKind::Step(step)).await;
    }

    /// Convenience: human-readable progress line.
    pub async fn log(&mut self, line: impl Into<String>) {
        self.emit(ProgressKind::Log(line.into())).await;
    }

    /// Convenience: surfaced fix record.
    pub async fn fix(&mut self, fix: FixRecord) {
        self.emit(ProgressKind::Fix(fix)).await;
    }

    /// Convenience: final score.
    pub async fn score(&mut self, score: RunScore) {
        self.emit(ProgressKind::Score(score)).await;
    }
}
