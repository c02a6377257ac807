//! Error types for ClinicOps domain types

use thiserror::Error;

/// Result type alias using the ClinicOps common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while interpreting values reported by the clinic API
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown {kind} status: {value}")]
    UnknownStatus { kind: &'static str, value: String },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
