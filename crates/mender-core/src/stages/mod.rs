//! Pipeline stages of the repair loop.
//!
//! Each stage receives the current [`crate::domain::Ledger`], performs its
//! work, and applies a single documented update. Model-output parsing is
//! isolated into per-stage parser functions with explicit fallbacks, so stage
//! logic is never exposed to a parse failure.

pub mod classify;
pub mod localize;
pub mod repair;
pub mod testgen;
pub mod validate;

pub use classify::classify;
pub use localize::{localize, Location};
pub use repair::{repair, RepairResponse};
pub use testgen::generate_tests;
pub use validate::{check_format, validate, FormatVerdict, COMMIT_TAG};
