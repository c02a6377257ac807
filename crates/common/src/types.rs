//! Core types for the clinic API
//!
//! The clinic backend owns the treatment-plan lifecycle and enforces every
//! transition server-side. The enums here mirror that lifecycle so the
//! harness can name the transitions it exercises and the invariants it
//! asserts instead of comparing string literals.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Account role used to authenticate against the clinic API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Doctor,
    Admin,
    Receptionist,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Doctor, Role::Admin, Role::Receptionist];

    /// Prefix used for `CLINIC_<ROLE>_USERNAME` style environment variables
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Role::Doctor => "DOCTOR",
            Role::Admin => "ADMIN",
            Role::Receptionist => "RECEPTIONIST",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Doctor => write!(f, "doctor"),
            Role::Admin => write!(f, "admin"),
            Role::Receptionist => write!(f, "receptionist"),
        }
    }
}

/// Treatment plan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Draft,
    PendingReview,
    Approved,
    Rejected,
    InProgress,
    Completed,
    Cancelled,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "DRAFT",
            PlanStatus::PendingReview => "PENDING_REVIEW",
            PlanStatus::Approved => "APPROVED",
            PlanStatus::Rejected => "REJECTED",
            PlanStatus::InProgress => "IN_PROGRESS",
            PlanStatus::Completed => "COMPLETED",
            PlanStatus::Cancelled => "CANCELLED",
        }
    }

    /// Transitions the backend accepts for a plan.
    ///
    /// ```text
    /// DRAFT ──submit──▶ PENDING_REVIEW ──approve──▶ APPROVED ──▶ IN_PROGRESS ──▶ COMPLETED
    ///   ▲                  │      │                    │             │
    ///   └──────revise──────┘      └──reject──▶ REJECTED┘(cancel)     └──▶ CANCELLED
    /// ```
    pub fn can_transition_to(&self, next: PlanStatus) -> bool {
        use PlanStatus::*;
        matches!(
            (self, next),
            (Draft, PendingReview)
                | (Draft, Cancelled)
                | (PendingReview, Approved)
                | (PendingReview, Rejected)
                | (PendingReview, Draft)
                | (Rejected, Draft)
                | (Approved, InProgress)
                | (Approved, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Cancelled)
        )
    }

    /// Validate a transition, returning the new status
    pub fn transition(self, next: PlanStatus) -> Result<PlanStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DRAFT" => Ok(PlanStatus::Draft),
            "PENDING_REVIEW" => Ok(PlanStatus::PendingReview),
            "APPROVED" => Ok(PlanStatus::Approved),
            "REJECTED" => Ok(PlanStatus::Rejected),
            "IN_PROGRESS" => Ok(PlanStatus::InProgress),
            "COMPLETED" => Ok(PlanStatus::Completed),
            "CANCELLED" => Ok(PlanStatus::Cancelled),
            other => Err(Error::UnknownStatus {
                kind: "plan",
                value: other.to_string(),
            }),
        }
    }
}

/// Status of a single item inside a treatment plan phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Pending,
    ReadyForBooking,
    Scheduled,
    InProgress,
    Completed,
    Skipped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "PENDING",
            ItemStatus::ReadyForBooking => "READY_FOR_BOOKING",
            ItemStatus::Scheduled => "SCHEDULED",
            ItemStatus::InProgress => "IN_PROGRESS",
            ItemStatus::Completed => "COMPLETED",
            ItemStatus::Skipped => "SKIPPED",
        }
    }

    /// Item transitions the backend accepts once the parent plan is approved
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Pending, ReadyForBooking)
                | (Pending, Skipped)
                | (ReadyForBooking, Scheduled)
                | (ReadyForBooking, Skipped)
                | (Scheduled, InProgress)
                | (Scheduled, ReadyForBooking)
                | (InProgress, Completed)
                | (Skipped, ReadyForBooking)
        )
    }

    pub fn transition(self, next: ItemStatus) -> Result<ItemStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(Error::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }

    /// An item can be booked only after the plan has been approved
    pub fn is_actionable(&self) -> bool {
        matches!(self, ItemStatus::ReadyForBooking)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PENDING" => Ok(ItemStatus::Pending),
            "READY_FOR_BOOKING" => Ok(ItemStatus::ReadyForBooking),
            "SCHEDULED" => Ok(ItemStatus::Scheduled),
            "IN_PROGRESS" => Ok(ItemStatus::InProgress),
            "COMPLETED" => Ok(ItemStatus::Completed),
            "SKIPPED" => Ok(ItemStatus::Skipped),
            other => Err(Error::UnknownStatus {
                kind: "item",
                value: other.to_string(),
            }),
        }
    }
}

/// Plan status implied by an item status change.
///
/// Starting work on any item moves an approved plan into IN_PROGRESS.
/// Other item statuses do not pin the plan status.
pub fn expected_plan_status_after(item: ItemStatus) -> Option<PlanStatus> {
    match item {
        ItemStatus::InProgress => Some(PlanStatus::InProgress),
        _ => None,
    }
}

/// Reviewer decision on a plan pending review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl ApprovalDecision {
    /// Plan status the decision should produce
    pub fn resulting_status(&self) -> PlanStatus {
        match self {
            ApprovalDecision::Approved => PlanStatus::Approved,
            ApprovalDecision::Rejected => PlanStatus::Rejected,
        }
    }
}

// Wire DTOs

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Body for creating a custom treatment plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomPlanRequest {
    pub plan_name: String,
    pub patient_code: String,
    pub doctor_employee_code: String,
    #[serde(default)]
    pub discount_amount: f64,
    pub payment_type: String,
    pub phases: Vec<NewPhase>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPhase {
    pub phase_number: u32,
    pub phase_name: String,
    pub estimated_duration_days: u32,
    pub items: Vec<NewItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub service_code: String,
    pub sequence_number: u32,
    pub quantity: u32,
    pub price: f64,
}

/// Treatment plan as returned by create / detail endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentPlanDetail {
    pub plan_code: String,
    pub status: String,
    #[serde(default)]
    pub approval_status: Option<String>,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub phases: Vec<PlanPhase>,
}

impl TreatmentPlanDetail {
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn plan_status(&self) -> Result<PlanStatus> {
        self.status.parse()
    }

    /// All items across phases, in phase order
    pub fn items(&self) -> impl Iterator<Item = &PlanItem> {
        self.phases.iter().flat_map(|p| p.items.iter())
    }

    /// First item that can be booked right now
    pub fn first_actionable_item(&self) -> Option<&PlanItem> {
        self.items()
            .find(|item| matches!(item.item_status(), Ok(s) if s.is_actionable()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPhase {
    #[serde(default)]
    pub phase_number: u32,
    #[serde(default)]
    pub phase_name: Option<String>,
    #[serde(default)]
    pub items: Vec<PlanItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanItem {
    pub item_id: i64,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub service_code: Option<String>,
    pub status: String,
}

impl PlanItem {
    pub fn item_status(&self) -> Result<ItemStatus> {
        self.status.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub approval_status: ApprovalDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatusUpdate {
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
