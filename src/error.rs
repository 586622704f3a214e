//! Error types for berth
//!
//! Uses `thiserror` for library errors; commands wrap these in `anyhow`
//! at the binary boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for berth operations
pub type BerthResult<T> = Result<T, BerthError>;

/// Main error type for berth operations
#[derive(Error, Debug)]
pub enum BerthError {
    /// Malformed or conflicting configuration; reported to the operator,
    /// nothing is mutated.
    #[error("invalid configuration: {message}")]
    Validation { message: String },

    /// Referential-integrity failure inside the compiler. Always a defect,
    /// never operator-caused.
    #[error("internal compile error: {message}")]
    Compile { message: String },

    /// Certificate bootstrap or issuance failure; prior working material is
    /// left untouched.
    #[error("certificate error: {message}")]
    Certificate { message: String },

    /// No free port or subnet in the candidate ranges.
    #[error("allocation exhausted: no free {resource} in {ranges}")]
    AllocationExhausted { resource: String, ranges: String },

    /// The container runtime rejected or partially applied a topology.
    #[error("driver error: {message}")]
    Driver { message: String },

    /// No configuration exists yet
    #[error("no configuration found at {path} - run 'berth setup' first")]
    NotFound { path: PathBuf },

    /// Snapshot failed re-validation against the current host
    #[error("snapshot {id} is not valid on this host: {reason}")]
    InvalidSnapshot { id: String, reason: String },

    /// Import string could not be decoded
    #[error("invalid export string: {message}")]
    InvalidExport { message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl BerthError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a compiler defect.
    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile {
            message: message.into(),
        }
    }

    /// Shorthand for a certificate failure.
    pub fn certificate(message: impl Into<String>) -> Self {
        Self::Certificate {
            message: message.into(),
        }
    }

    /// Shorthand for a driver failure.
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }
}
