//! Step runner that executes workflow steps and records their outcomes

use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::{ApiError, ApiResult, E2eError, E2eResult};
use crate::report::{self, Summary};

/// Outcome class of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pass,
    Fail,
    Skip,
    Warn,
}

/// Serializable view of the error behind a FAIL or SKIP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub kind: String,
    pub status: Option<u16>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl From<&ApiError> for StepError {
    fn from(e: &ApiError) -> Self {
        let body = match e {
            ApiError::Http { body, .. } if !body.is_empty() => Some(body.clone()),
            _ => None,
        };
        Self {
            kind: e.kind().to_string(),
            status: e.status(),
            message: e.to_string(),
            body,
        }
    }
}

/// Result of one step invocation; never mutated once recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub module: String,
    pub status: StepStatus,
    pub message: Option<String>,
    pub data: Option<Value>,
    pub error: Option<StepError>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Whether a step may absorb a known backend defect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerance {
    /// Only the not-implemented status is downgraded to SKIP
    Strict,
    /// Errors matching a configured known defect are SKIP as well
    KnownDefects,
}

/// A backend failure signature accepted as "degraded, keep going"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownDefect {
    pub status: u16,
    #[serde(default)]
    pub method: Option<String>,
    /// Substring of the request path
    #[serde(default)]
    pub path: Option<String>,
    pub reason: String,
}

impl KnownDefect {
    pub fn matches(&self, error: &ApiError) -> bool {
        let ApiError::Http { status, method, path, .. } = error else {
            return false;
        };
        *status == self.status
            && self
                .method
                .as_deref()
                .map_or(true, |m| m.eq_ignore_ascii_case(method))
            && self.path.as_deref().map_or(true, |p| path.contains(p))
    }
}

/// Rules mapping step errors to SKIP instead of FAIL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailurePolicy {
    pub not_implemented_status: u16,
    pub known_defects: Vec<KnownDefect>,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            not_implemented_status: 404,
            known_defects: vec![KnownDefect {
                status: 500,
                method: None,
                path: None,
                reason: "backend returns 500 on this endpoint, tracked separately".to_string(),
            }],
        }
    }
}

/// Classify a failed action into a status and message
pub fn classify(error: &ApiError, tolerance: Tolerance, policy: &FailurePolicy) -> (StepStatus, String) {
    if let Some(status) = error.status() {
        if status == policy.not_implemented_status {
            return (
                StepStatus::Skip,
                format!("endpoint not implemented (HTTP {})", status),
            );
        }

        if tolerance == Tolerance::KnownDefects {
            if let Some(defect) = policy.known_defects.iter().find(|d| d.matches(error)) {
                return (
                    StepStatus::Skip,
                    format!("known backend defect (HTTP {}): {}; continuing", status, defect.reason),
                );
            }
        }
    }

    (StepStatus::Fail, describe(error))
}

fn describe(error: &ApiError) -> String {
    match error {
        ApiError::Http { body, method, path, .. } if !body.is_empty() => {
            let snippet: String = body.chars().take(200).collect();
            format!("{} ({} {}): {}", error, method, path, snippet)
        }
        ApiError::Http { method, path, .. } => format!("{} ({} {})", error, method, path),
        _ => error.to_string(),
    }
}

/// Value returned by a warning-capable step
#[derive(Debug, Clone)]
pub struct Checked<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Checked<T> {
    pub fn ok(value: T) -> Self {
        Self { value, warning: None }
    }

    pub fn warn(value: T, warning: impl Into<String>) -> Self {
        Self {
            value,
            warning: Some(warning.into()),
        }
    }
}

/// Sequential step runner.
///
/// Each `run*` call awaits its action to completion and appends exactly
/// one [`StepResult`]. Action errors are converted to data here and never
/// propagate; callers decide which missing outputs abort the workflow.
pub struct Runner {
    policy: FailurePolicy,
    module: String,
    results: Vec<StepResult>,
    echo: bool,
}

impl Runner {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            module: "General".to_string(),
            results: Vec::new(),
            echo: true,
        }
    }

    /// Disable the per-step console line
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    /// Set the module label stamped on subsequent results
    pub fn section(&mut self, module: &str) {
        if self.echo {
            report::print_section(module);
        }
        self.module = module.to_string();
    }

    /// Run a step; returns its value only when it passed
    pub async fn run<T, Fut>(&mut self, name: &str, tolerance: Tolerance, action: Fut) -> Option<T>
    where
        T: Serialize,
        Fut: Future<Output = ApiResult<T>>,
    {
        self.run_checked(name, tolerance, async move { action.await.map(Checked::ok) })
            .await
    }

    /// Run a step whose action may flag a non-fatal caveat (WARN)
    pub async fn run_checked<T, Fut>(&mut self, name: &str, tolerance: Tolerance, action: Fut) -> Option<T>
    where
        T: Serialize,
        Fut: Future<Output = ApiResult<Checked<T>>>,
    {
        debug!("Running step: {}", name);
        let start = Instant::now();
        let outcome = action.await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (status, message, data, step_error, value) = match outcome {
            Ok(Checked { value, warning }) => {
                let data = serde_json::to_value(&value).ok().filter(|v| !v.is_null());
                match warning {
                    Some(w) => (StepStatus::Warn, Some(w), data, None, Some(value)),
                    None => (StepStatus::Pass, None, data, None, Some(value)),
                }
            }
            Err(e) => {
                let (status, message) = classify(&e, tolerance, &self.policy);
                match status {
                    StepStatus::Skip => warn!("{}: {}", name, message),
                    _ => error!("{}: {}", name, message),
                }
                (status, Some(message), None, Some(StepError::from(&e)), None)
            }
        };

        self.record(StepResult {
            name: name.to_string(),
            module: self.module.clone(),
            status,
            message,
            data,
            error: step_error,
            duration_ms,
            finished_at: Utc::now(),
        });

        match status {
            StepStatus::Pass | StepStatus::Warn => value,
            StepStatus::Fail | StepStatus::Skip => None,
        }
    }

    fn record(&mut self, result: StepResult) {
        if self.echo {
            report::print_step(&result);
        }
        self.results.push(result);
    }

    /// Turn the missing output of a hard-gating step into an abort
    pub fn require<T>(&self, value: Option<T>, step: &str) -> E2eResult<T> {
        value.ok_or_else(|| {
            let reason = self
                .results
                .iter()
                .rev()
                .find(|r| r.name == step)
                .and_then(|r| r.message.clone())
                .unwrap_or_else(|| "step produced no output".to_string());
            E2eError::Aborted {
                step: step.to_string(),
                reason,
            }
        })
    }

    pub fn results(&self) -> &[StepResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<StepResult> {
        self.results
    }

    pub fn summary(&self) -> Summary {
        Summary::from_results(&self.results)
    }
}
