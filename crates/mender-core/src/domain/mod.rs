//! Domain types for the repair orchestration engine.

pub mod error;
pub mod events;
pub mod ledger;

pub use error::{MenderError, Result};
pub use events::{ProgressEvent, ProgressKind, RunScore, StreamStatus};
pub use ledger::{
    BugType, FixRecord, FixStatus, Ledger, RunStatus, MAX_FORMAT_ATTEMPTS, MAX_LOGIC_RETRIES,
};
