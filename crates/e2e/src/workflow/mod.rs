//! Workflow definitions and the top-level run driver

pub mod comprehensive;
pub mod treatment_plan;

use std::path::Path;

use clap::ValueEnum;
use clinicops_common::Role;
use tracing::{error, info};

use crate::auth;
use crate::client::ApiClient;
use crate::config::HarnessConfig;
use crate::context::WorkflowContext;
use crate::error::{ApiError, E2eError, E2eResult};
use crate::report::{self, Summary};
use crate::runner::{Runner, StepResult, Tolerance};

pub const AUTH_MODULE: &str = "Auth";

/// Which workflow(s) to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Workflow {
    /// Treatment-plan lifecycle from creation to completed item
    TreatmentPlan,
    /// Read-only checks across every module plus consistency checks
    Comprehensive,
    /// Treatment-plan lifecycle, then the comprehensive checks
    All,
}

impl Workflow {
    /// Roles whose credentials must be configured before the run starts
    pub fn required_roles(&self, config: &HarnessConfig) -> Vec<Role> {
        let mut roles = match self {
            Workflow::TreatmentPlan => treatment_plan::REQUIRED_ROLES.to_vec(),
            Workflow::Comprehensive => comprehensive::required_roles(config),
            Workflow::All => {
                let mut roles = treatment_plan::REQUIRED_ROLES.to_vec();
                roles.extend(comprehensive::required_roles(config));
                roles
            }
        };
        roles.sort();
        roles.dedup();
        roles
    }

    /// Drive the workflow; `Err` only for abort-worthy failures
    pub async fn run(&self, runner: &mut Runner, client: &ApiClient, config: &HarnessConfig) -> E2eResult<()> {
        match self {
            Workflow::TreatmentPlan => treatment_plan::run(runner, client, config).await.map(|_| ()),
            Workflow::Comprehensive => comprehensive::run(runner, client, config).await,
            Workflow::All => {
                treatment_plan::run(runner, client, config).await?;
                comprehensive::run(runner, client, config).await
            }
        }
    }
}

/// Authenticate one role; the whole run aborts when this fails
pub(crate) async fn login_as(
    runner: &mut Runner,
    client: &ApiClient,
    config: &HarnessConfig,
    ctx: &mut WorkflowContext,
    role: Role,
) -> E2eResult<()> {
    let step = format!("Login as {}", role);
    let token = runner
        .run(&step, Tolerance::Strict, async {
            let credentials = config
                .credentials
                .get(role)
                .ok_or_else(|| ApiError::Validation(format!("no credentials configured for {}", role)))?;
            auth::login(client, credentials).await
        })
        .await;

    let token = runner.require(token, &step)?;
    ctx.set_token(role, token);
    Ok(())
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub results: Vec<StepResult>,
    pub summary: Summary,
    /// Diagnostic of the abort-worthy failure that stopped the run
    pub aborted: Option<String>,
}

impl RunOutcome {
    /// 0 iff no step failed and the run was not aborted
    pub fn exit_code(&self) -> i32 {
        if self.aborted.is_some() {
            1
        } else {
            self.summary.exit_code()
        }
    }

    /// Print the summary, write the optional JSON report and return the exit code.
    ///
    /// A report that cannot be written is logged; the exit code still
    /// reflects only the step results.
    pub fn finish(&self, json_report: Option<&Path>) -> i32 {
        report::print_summary(&self.summary, &self.results);
        if let Some(reason) = &self.aborted {
            report::print_abort(reason);
        }
        if let Some(path) = json_report {
            if let Err(e) = report::write_json(path, &self.summary, &self.results) {
                error!("Failed to write JSON report to {}: {}", path.display(), e);
            }
        }
        self.exit_code()
    }
}

/// Validate configuration, then drive `workflow` to completion or abort.
///
/// Configuration and client construction errors are returned before any
/// request is made; aborts are captured in the outcome.
pub async fn execute(workflow: Workflow, config: &HarnessConfig, mut runner: Runner) -> E2eResult<RunOutcome> {
    config.validate(&workflow.required_roles(config))?;
    let client = ApiClient::new(&config.base_url, config.request_timeout())?;
    info!("Running {:?} workflow against {}", workflow, client.base_url());

    let aborted = match workflow.run(&mut runner, &client, config).await {
        Ok(()) => None,
        Err(e @ E2eError::Aborted { .. }) => {
            error!("{}", e);
            Some(e.to_string())
        }
        Err(e) => return Err(e),
    };

    let summary = runner.summary();
    Ok(RunOutcome {
        results: runner.into_results(),
        summary,
        aborted,
    })
}
