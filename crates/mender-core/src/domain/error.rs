//! Domain-level error taxonomy for mender.

/// Mender domain errors.
///
/// External-call failures that the router can route around (sandbox faults,
/// publish rejections) are represented as ledger statuses, not as variants
/// here. These variants cover the cases where a stage genuinely cannot
/// proceed, such as the reasoning backend being unreachable.
#[derive(Debug, thiserror::Error)]
pub enum MenderError {
    #[error("reasoning backend error: {0}")]
    Reasoner(String),

    #[error("repository intake failed: {0}")]
    RepoIntake(String),

    #[error("run not found: {0}")]
    RunNotFound(uuid::Uuid),

    #[error("invalid repair request: {0}")]
    InvalidRequest(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for mender domain operations.
pub type Result<T> = std::result::Result<T, MenderError>;
