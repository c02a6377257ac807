//! ClinicOps API Workflow Harness
//!
//! Drives the clinic REST API through ordered, authenticated workflows and
//! records a PASS / FAIL / SKIP / WARN result per step:
//! - Authenticates each role once and carries tokens and created entity ids
//!   between steps in an explicit [`WorkflowContext`]
//! - Converts every step error into data, downgrading not-implemented
//!   endpoints and configured known defects to SKIP
//! - Prints a grouped summary and derives the process exit code
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Workflow Harness (Rust)                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Workflow::run(runner, client, config)                      │
//! │    ├── login_as(role)            -> RoleToken   (gating)    │
//! │    ├── Runner::run(name, tolerance, action) -> Option<T>    │
//! │    ├── Runner::run_checked(...)  -> PASS | WARN             │
//! │    └── Runner::require(value)    -> abort on gating failure │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ApiClient  ── JSON over HTTP, bearer auth, ApiError        │
//! │  Summary    ── counts per module, exit code                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod report;
pub mod runner;
pub mod workflow;

pub use client::ApiClient;
pub use config::HarnessConfig;
pub use context::WorkflowContext;
pub use error::{ApiError, ApiResult, E2eError, E2eResult};
pub use runner::{Runner, StepResult, StepStatus, Tolerance};
pub use workflow::{execute, RunOutcome, Workflow};
