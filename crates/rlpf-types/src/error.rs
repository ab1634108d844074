// ─────────────────────────────────────────────────────────────────────
// RLPF Kernel — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all RLPF kernel failures.
#[derive(Error, Debug)]
pub enum RlpfError {
    /// Invalid input (predicate fields, parameters).
    #[error("validation error: {0}")]
    Validation(String),

    /// Predicate extraction failed unrecoverably.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Knowledge graph load or lookup failed.
    #[error("knowledge graph error: {0}")]
    Graph(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Numerical error (NaN/Inf in computation).
    #[error("numerical error: {0}")]
    Numerical(String),

    /// JSON encode/decode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a fact file or export stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RlpfResult<T> = Result<T, RlpfError>;
