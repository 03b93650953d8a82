//! mender core library
//!
//! The repair orchestration engine: classifies test failures, asks a
//! reasoning model for a patch, validates and re-executes it in a sandbox,
//! and publishes the result as a fork + pull request.

pub mod domain;
pub mod events;
pub mod llm;
pub mod orchestrator;
pub mod publish;
pub mod repo;
pub mod router;
pub mod sandbox;
pub mod stages;
pub mod store;
pub mod telemetry;

pub use domain::{
    BugType, FixRecord, FixStatus, Ledger, MenderError, ProgressEvent, ProgressKind, Result,
    RunScore, RunStatus, StreamStatus, MAX_FORMAT_ATTEMPTS, MAX_LOGIC_RETRIES,
};

pub use events::ProgressSender;
pub use llm::{HttpReasoner, Reasoner, ReasonerConfig, API_KEY_ENV};
pub use orchestrator::{Orchestrator, RepairRequest, RunReport};
pub use publish::{
    branch_name, parse_repo_url, GitHubPublisher, PublishContext, Publisher, TOKEN_ENV,
};
pub use repo::Workspace;
pub use router::Terminal;
pub use sandbox::{DockerSandbox, TestOutcome, TestSandbox, DEFAULT_TIMEOUT};
pub use store::RunStore;
pub use telemetry::init_tracing;

/// mender version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
