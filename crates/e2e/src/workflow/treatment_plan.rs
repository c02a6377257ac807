//! Treatment-plan lifecycle workflow
//!
//! Creates a custom plan as a doctor, pushes it through review and
//! approval, then walks one item from READY_FOR_BOOKING to COMPLETED.
//! Login and plan creation gate the run; detail and submit tolerate the
//! configured known defects so downstream steps still get verified.

use clinicops_common::{
    expected_plan_status_after, ApprovalDecision, ApprovalRequest, CreateCustomPlanRequest, ItemStatus,
    ItemStatusUpdate, NewItem, NewPhase, PlanStatus, Role, TreatmentPlanDetail,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::client::ApiClient;
use crate::config::{HarnessConfig, TreatmentPlanFixture};
use crate::context::WorkflowContext;
use crate::error::{ApiError, ApiResult, E2eResult};
use crate::runner::{Checked, Runner, Tolerance};
use crate::workflow::{login_as, AUTH_MODULE};

pub const MODULE: &str = "Treatment Plans";
pub const REQUIRED_ROLES: [Role; 2] = [Role::Doctor, Role::Admin];

pub const STEP_CREATE_PLAN: &str = "Create custom treatment plan";
pub const STEP_GET_DETAIL: &str = "Get plan detail";
pub const STEP_SUBMIT: &str = "Submit plan for review";
pub const STEP_APPROVE: &str = "Approve plan (admin)";
pub const STEP_FETCH_ITEMS: &str = "Fetch plan items";
pub const STEP_PLAN_FOLLOWS_ITEM: &str = "Plan status follows item IN_PROGRESS";

fn create_plan_path(fixture: &TreatmentPlanFixture) -> String {
    fixture.render("/api/v1/patients/{patientCode}/treatment-plans/custom")
}

fn plan_detail_path(fixture: &TreatmentPlanFixture, plan_code: &str) -> String {
    format!(
        "{}/{}",
        fixture.render("/api/v1/patients/{patientCode}/treatment-plans"),
        plan_code
    )
}

fn submit_path(plan_code: &str) -> String {
    format!("/api/v1/patient-treatment-plans/{}/submit-for-review", plan_code)
}

fn approval_path(plan_code: &str) -> String {
    format!("/api/v1/patient-treatment-plans/{}/approval", plan_code)
}

fn item_status_path(item_id: i64) -> String {
    format!("/api/v1/patient-plan-items/{}/status", item_id)
}

/// Two phases with one item each, built from the fixture
pub fn custom_plan_request(fixture: &TreatmentPlanFixture) -> CreateCustomPlanRequest {
    let phases = fixture
        .service_codes
        .iter()
        .take(2)
        .enumerate()
        .map(|(i, service_code)| {
            let number = i as u32 + 1;
            NewPhase {
                phase_number: number,
                phase_name: format!("Phase {}", number),
                estimated_duration_days: 7,
                items: vec![NewItem {
                    service_code: service_code.clone(),
                    sequence_number: 1,
                    quantity: 1,
                    price: fixture.item_price,
                }],
            }
        })
        .collect();

    CreateCustomPlanRequest {
        plan_name: fixture.plan_name.clone(),
        patient_code: fixture.patient_code.clone(),
        doctor_employee_code: fixture.doctor_code.clone(),
        discount_amount: 0.0,
        payment_type: fixture.payment_type.clone(),
        phases,
    }
}

fn validate_created(plan: &TreatmentPlanDetail) -> ApiResult<i64> {
    if plan.plan_code.is_empty() {
        return Err(ApiError::Validation("created plan has an empty plan code".to_string()));
    }
    if plan.phases.len() != 2 {
        return Err(ApiError::mismatch("phase count", 2, plan.phases.len()));
    }
    let item_id = plan.phases[0]
        .items
        .first()
        .map(|item| item.item_id)
        .ok_or_else(|| ApiError::Validation("first phase has no items".to_string()))?;
    if item_id == 0 {
        return Err(ApiError::Validation("first item id is zero".to_string()));
    }
    Ok(item_id)
}

/// Plan status carried by a mutation response
fn reported_plan_status(body: &Value) -> ApiResult<PlanStatus> {
    let status = body
        .get("status")
        .or_else(|| body.get("planStatus"))
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::Validation("response carries no plan status".to_string()))?;
    Ok(status.parse()?)
}

fn expect_plan_status(what: &str, expected: PlanStatus, actual: PlanStatus) -> ApiResult<PlanStatus> {
    if actual == expected {
        Ok(actual)
    } else {
        Err(ApiError::mismatch(what, expected, actual))
    }
}

/// PASS for a move in the plan table, WARN otherwise; unknown origin passes
fn checked_plan_move(previous: Option<PlanStatus>, next: PlanStatus) -> Checked<PlanStatus> {
    match previous.map(|from| from.transition(next)) {
        Some(Err(e)) => Checked::warn(next, e.to_string()),
        _ => Checked::ok(next),
    }
}

async fn fetch_plan(
    client: &ApiClient,
    fixture: &TreatmentPlanFixture,
    ctx: &WorkflowContext,
) -> ApiResult<TreatmentPlanDetail> {
    let plan_code = ctx.require_plan_code()?;
    let body = client
        .get(&plan_detail_path(fixture, plan_code), Some(ctx.token(Role::Doctor)?))
        .await?;
    Ok(TreatmentPlanDetail::from_value(body)?)
}

#[derive(Debug, Serialize)]
struct CreatedPlan {
    plan_code: String,
    first_item_id: i64,
    phases: usize,
}

/// Run the full lifecycle; returns the context built along the way
pub async fn run(runner: &mut Runner, client: &ApiClient, config: &HarnessConfig) -> E2eResult<WorkflowContext> {
    let fixture = &config.treatment_plan;
    let mut ctx = WorkflowContext::new();

    runner.section(AUTH_MODULE);
    login_as(runner, client, config, &mut ctx, Role::Doctor).await?;
    login_as(runner, client, config, &mut ctx, Role::Admin).await?;

    runner.section(MODULE);

    let created = runner
        .run(STEP_CREATE_PLAN, Tolerance::Strict, async {
            let body = client
                .post(
                    &create_plan_path(fixture),
                    &custom_plan_request(fixture),
                    Some(ctx.token(Role::Doctor)?),
                )
                .await?;
            let plan = TreatmentPlanDetail::from_value(body)?;
            let first_item_id = validate_created(&plan)?;
            Ok(CreatedPlan {
                phases: plan.phases.len(),
                plan_code: plan.plan_code,
                first_item_id,
            })
        })
        .await;
    let created = runner.require(created, STEP_CREATE_PLAN)?;
    info!("Created plan {}", created.plan_code);
    ctx.plan_code = Some(created.plan_code);
    ctx.plan_status = Some(PlanStatus::Draft);
    ctx.item_id = Some(created.first_item_id);

    let detail = runner
        .run(STEP_GET_DETAIL, Tolerance::KnownDefects, async {
            let plan = fetch_plan(client, fixture, &ctx).await?;
            let expected_code = ctx.require_plan_code()?;
            if plan.plan_code != expected_code {
                return Err(ApiError::mismatch("plan code", expected_code, &plan.plan_code));
            }
            expect_plan_status("status of new plan", PlanStatus::Draft, plan.plan_status()?)?;
            Ok(plan)
        })
        .await;
    if let Some(plan) = detail {
        ctx.plan_status = plan.plan_status().ok();
    }

    let submitted = runner
        .run_checked(STEP_SUBMIT, Tolerance::KnownDefects, async {
            let plan_code = ctx.require_plan_code()?;
            let body = client
                .patch(
                    &submit_path(plan_code),
                    &json!({ "notes": "Submitted by workflow harness" }),
                    Some(ctx.token(Role::Doctor)?),
                )
                .await?;
            let status = expect_plan_status(
                "status after submit",
                PlanStatus::PendingReview,
                reported_plan_status(&body)?,
            )?;
            Ok(checked_plan_move(ctx.plan_status, status))
        })
        .await;
    // A failed submit leaves the server-side status unknown
    ctx.plan_status = submitted;

    let decision = ApprovalDecision::Approved;
    let approved = runner
        .run_checked(STEP_APPROVE, Tolerance::Strict, async {
            let plan_code = ctx.require_plan_code()?;
            let body = client
                .patch(
                    &approval_path(plan_code),
                    &ApprovalRequest {
                        approval_status: decision,
                        notes: Some("Approved by workflow harness".to_string()),
                    },
                    Some(ctx.token(Role::Admin)?),
                )
                .await?;
            let status = expect_plan_status(
                "status after approval",
                decision.resulting_status(),
                reported_plan_status(&body)?,
            )?;
            Ok(checked_plan_move(ctx.plan_status, status))
        })
        .await;
    if let Some(status) = approved {
        ctx.plan_status = Some(status);
    }

    let item = runner
        .run_checked(STEP_FETCH_ITEMS, Tolerance::KnownDefects, async {
            let plan = fetch_plan(client, fixture, &ctx).await?;
            if let Some(item) = plan.first_actionable_item() {
                return Ok(Checked::ok((item.item_id, item.item_status()?)));
            }
            let fallback = ctx.require_item_id()?;
            let status = plan
                .items()
                .find(|i| i.item_id == fallback)
                .map(|i| i.item_status())
                .transpose()?
                .unwrap_or(ItemStatus::Pending);
            Ok(Checked::warn(
                (fallback, status),
                format!(
                    "no {} item found; continuing with item {} ({})",
                    ItemStatus::ReadyForBooking,
                    fallback,
                    status
                ),
            ))
        })
        .await;
    if let Some((item_id, status)) = item {
        ctx.item_id = Some(item_id);
        ctx.item_status = Some(status);
    }

    transition_item(runner, client, &mut ctx, ItemStatus::Scheduled).await;
    transition_item(runner, client, &mut ctx, ItemStatus::InProgress).await;
    if let Some(status) = check_plan_follows_item(runner, client, fixture, &ctx, ItemStatus::InProgress).await {
        ctx.plan_status = Some(status);
    }
    transition_item(runner, client, &mut ctx, ItemStatus::Completed).await;

    Ok(ctx)
}

/// Move the tracked item to `target`.
///
/// WARN when the move is not in the documented item table or the server
/// echoes a different status than requested.
async fn transition_item(runner: &mut Runner, client: &ApiClient, ctx: &mut WorkflowContext, target: ItemStatus) {
    let step = format!("Item -> {}", target);
    let previous = ctx.item_status;

    let reported = runner
        .run_checked(&step, Tolerance::Strict, async {
            let item_id = ctx.require_item_id()?;
            let body = client
                .patch(
                    &item_status_path(item_id),
                    &ItemStatusUpdate {
                        status: target,
                        notes: None,
                    },
                    Some(ctx.token(Role::Doctor)?),
                )
                .await?;

            let reported = body
                .get("status")
                .and_then(Value::as_str)
                .map(|s| s.parse::<ItemStatus>())
                .transpose()?
                .unwrap_or(target);

            let mut warnings = Vec::new();
            if let Some(Err(e)) = previous.map(|from| from.transition(target)) {
                warnings.push(e.to_string());
            }
            if reported != target {
                warnings.push(format!("server reports item status {}, requested {}", reported, target));
            }

            Ok(if warnings.is_empty() {
                Checked::ok(reported)
            } else {
                Checked::warn(reported, warnings.join("; "))
            })
        })
        .await;

    if let Some(status) = reported {
        ctx.item_status = Some(status);
    }
}

/// Re-fetch the parent plan and assert the status implied by `item_status`
async fn check_plan_follows_item(
    runner: &mut Runner,
    client: &ApiClient,
    fixture: &TreatmentPlanFixture,
    ctx: &WorkflowContext,
    item_status: ItemStatus,
) -> Option<PlanStatus> {
    let expected = expected_plan_status_after(item_status)?;

    runner
        .run(STEP_PLAN_FOLLOWS_ITEM, Tolerance::Strict, async {
            let plan = fetch_plan(client, fixture, ctx).await?;
            if plan.status != expected.as_str() {
                return Err(ApiError::mismatch(
                    &format!("plan status after item {}", item_status),
                    expected,
                    &plan.status,
                ));
            }
            Ok(expected)
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_plan_request_has_two_single_item_phases() {
        let request = custom_plan_request(&TreatmentPlanFixture::default());
        assert_eq!(request.phases.len(), 2);
        assert!(request.phases.iter().all(|p| p.items.len() == 1));
        assert_eq!(request.phases[1].phase_number, 2);
        assert_eq!(request.phases[0].items[0].service_code, "FILLING_COMP");
    }

    #[test]
    fn test_validate_created_plan() {
        let plan = TreatmentPlanDetail::from_value(json!({
            "planCode": "PLAN-1",
            "status": "DRAFT",
            "phases": [
                { "phaseNumber": 1, "items": [{ "itemId": 7, "status": "PENDING" }] },
                { "phaseNumber": 2, "items": [{ "itemId": 8, "status": "PENDING" }] }
            ]
        }))
        .unwrap();
        assert_eq!(validate_created(&plan).unwrap(), 7);

        let one_phase = TreatmentPlanDetail {
            phases: plan.phases[..1].to_vec(),
            ..plan.clone()
        };
        let err = validate_created(&one_phase).unwrap_err();
        assert_eq!(err.to_string(), "Validation failed: phase count: expected 2, got 1");
    }

    #[test]
    fn test_reported_plan_status() {
        assert_eq!(
            reported_plan_status(&json!({ "status": "PENDING_REVIEW" })).unwrap(),
            PlanStatus::PendingReview
        );
        assert_eq!(
            reported_plan_status(&json!({ "planStatus": "APPROVED" })).unwrap(),
            PlanStatus::Approved
        );
        assert!(reported_plan_status(&json!({})).is_err());
        assert!(reported_plan_status(&json!({ "status": "WHATEVER" })).is_err());
    }

    #[test]
    fn test_plan_moves_checked_against_table() {
        let checked = checked_plan_move(Some(PlanStatus::Draft), PlanStatus::PendingReview);
        assert_eq!(checked.value, PlanStatus::PendingReview);
        assert!(checked.warning.is_none());

        let checked = checked_plan_move(Some(PlanStatus::Draft), PlanStatus::Approved);
        assert_eq!(checked.value, PlanStatus::Approved);
        assert_eq!(
            checked.warning.as_deref(),
            Some("Invalid state transition: DRAFT -> APPROVED")
        );

        assert!(checked_plan_move(None, PlanStatus::Approved).warning.is_none());
    }

    #[test]
    fn test_paths() {
        let fixture = TreatmentPlanFixture::default();
        assert_eq!(
            plan_detail_path(&fixture, "PLAN-9"),
            "/api/v1/patients/BN-1001/treatment-plans/PLAN-9"
        );
        assert_eq!(item_status_path(5), "/api/v1/patient-plan-items/5/status");
    }
}
