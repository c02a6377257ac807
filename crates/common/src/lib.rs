//! ClinicOps Common Library
//!
//! Shared vocabulary of the clinic API: roles, treatment-plan lifecycle
//! statuses and the request/response shapes the harness exchanges.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
