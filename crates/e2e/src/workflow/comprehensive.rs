//! Comprehensive read-only smoke workflow
//!
//! Logs in every role, hits one or more list endpoints per module and
//! compares payload shapes of endpoint pairs that are supposed to agree.

use std::collections::BTreeSet;

use clinicops_common::Role;
use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::config::{ConsistencyCheck, HarnessConfig, ProbeExpect, ProbeSpec};
use crate::context::WorkflowContext;
use crate::error::{ApiError, ApiResult, E2eResult};
use crate::runner::{Checked, Runner, Tolerance};
use crate::workflow::{login_as, AUTH_MODULE};

/// Every role used by a login, probe or consistency check
pub fn required_roles(config: &HarnessConfig) -> Vec<Role> {
    let mut roles: Vec<Role> = Role::ALL.to_vec();
    roles.extend(config.probes.iter().map(|p| p.role));
    roles.extend(config.consistency_checks.iter().map(|c| c.role));
    roles.sort();
    roles.dedup();
    roles
}

#[derive(Debug, Serialize)]
struct ProbeOutcome {
    path: String,
    records: Option<usize>,
}

#[derive(Debug, Serialize)]
struct FieldComparison {
    left_fields: Vec<String>,
    right_fields: Vec<String>,
    compared: bool,
}

pub async fn run(runner: &mut Runner, client: &ApiClient, config: &HarnessConfig) -> E2eResult<()> {
    let mut ctx = WorkflowContext::new();

    runner.section(AUTH_MODULE);
    for role in Role::ALL {
        login_as(runner, client, config, &mut ctx, role).await?;
    }

    let mut current_module: Option<&str> = None;
    for probe in &config.probes {
        if current_module != Some(probe.module.as_str()) {
            runner.section(&probe.module);
            current_module = Some(probe.module.as_str());
        }
        run_probe(runner, client, config, &ctx, probe).await;
    }

    for check in &config.consistency_checks {
        if current_module != Some(check.module.as_str()) {
            runner.section(&check.module);
            current_module = Some(check.module.as_str());
        }
        run_consistency_check(runner, client, config, &ctx, check).await;
    }

    Ok(())
}

async fn run_probe(runner: &mut Runner, client: &ApiClient, config: &HarnessConfig, ctx: &WorkflowContext, probe: &ProbeSpec) {
    let path = config.treatment_plan.render(&probe.path);
    runner
        .run(&probe.name, Tolerance::KnownDefects, async {
            let body = client.get(&path, Some(ctx.token(probe.role)?)).await?;
            let records = check_shape(&body, probe.expect)?;
            Ok(ProbeOutcome {
                path: path.clone(),
                records,
            })
        })
        .await;
}

async fn run_consistency_check(
    runner: &mut Runner,
    client: &ApiClient,
    config: &HarnessConfig,
    ctx: &WorkflowContext,
    check: &ConsistencyCheck,
) {
    let left_path = config.treatment_plan.render(&check.left);
    let right_path = config.treatment_plan.render(&check.right);

    runner
        .run_checked(&check.name, Tolerance::KnownDefects, async {
            let token = ctx.token(check.role)?;
            let left = client.get(&left_path, Some(token)).await?;
            let right = client.get(&right_path, Some(token)).await?;

            let (Some(left_fields), Some(right_fields)) = (first_record_fields(&left), first_record_fields(&right))
            else {
                return Ok(Checked::ok(FieldComparison {
                    left_fields: Vec::new(),
                    right_fields: Vec::new(),
                    compared: false,
                }));
            };

            let warning = compare_field_naming(&left_path, &left_fields, &right_path, &right_fields);
            let comparison = FieldComparison {
                left_fields: left_fields.into_iter().collect(),
                right_fields: right_fields.into_iter().collect(),
                compared: true,
            };
            Ok(match warning {
                Some(w) => Checked::warn(comparison, w),
                None => Checked::ok(comparison),
            })
        })
        .await;
}

/// Records of a list payload: a bare array or a page object
fn list_records(body: &Value) -> Option<&Vec<Value>> {
    match body {
        Value::Array(items) => Some(items),
        Value::Object(map) => ["content", "items", "data"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

fn check_shape(body: &Value, expect: ProbeExpect) -> ApiResult<Option<usize>> {
    match expect {
        ProbeExpect::List => list_records(body).map(|r| Some(r.len())).ok_or_else(|| {
            ApiError::Validation("expected a JSON array or a page object with a content array".to_string())
        }),
        ProbeExpect::Object if body.is_object() => Ok(None),
        ProbeExpect::Object => Err(ApiError::Validation("expected a JSON object".to_string())),
    }
}

/// Field names of the first record, or of the body itself when it is an object
fn first_record_fields(body: &Value) -> Option<BTreeSet<String>> {
    let record = match list_records(body) {
        Some(records) => records.first()?,
        None => body,
    };
    record.as_object().map(|o| o.keys().cloned().collect())
}

/// Describe field-name drift between two payloads, if any
fn compare_field_naming(
    left_label: &str,
    left: &BTreeSet<String>,
    right_label: &str,
    right: &BTreeSet<String>,
) -> Option<String> {
    let only_left: Vec<&str> = left.difference(right).map(String::as_str).collect();
    let only_right: Vec<&str> = right.difference(left).map(String::as_str).collect();
    if only_left.is_empty() && only_right.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if !only_left.is_empty() {
        parts.push(format!("only in {}: [{}]", left_label, only_left.join(", ")));
    }
    if !only_right.is_empty() {
        parts.push(format!("only in {}: [{}]", right_label, only_right.join(", ")));
    }
    Some(format!("field names differ; {}", parts.join("; ")))
}
