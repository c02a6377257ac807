//! Error types for the workflow harness

use thiserror::Error;

/// Failure of a single API interaction.
///
/// Every step action returns this type, so the step runner can classify
/// outcomes by matching on the variant instead of probing optional fields.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// DNS, connection refused, timeout: no HTTP status available
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} {status_text}")]
    Http {
        status: u16,
        status_text: String,
        method: String,
        path: String,
        body: String,
    },

    /// The call succeeded but the response did not look the way it should
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl ApiError {
    /// HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an expected-vs-actual validation failure
    pub fn mismatch(what: &str, expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        ApiError::Validation(format!("{what}: expected {expected}, got {actual}"))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Network(_) => "network",
            ApiError::Http { .. } => "http",
            ApiError::Validation(_) => "validation",
        }
    }
}

impl From<clinicops_common::Error> for ApiError {
    fn from(e: clinicops_common::Error) -> Self {
        ApiError::Validation(e.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Harness-level failures that stop the run
#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Workflow aborted at '{step}': {reason}")]
    Aborted { step: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
