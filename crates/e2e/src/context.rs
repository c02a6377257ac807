//! Cross-step workflow state

use std::collections::HashMap;

use clinicops_common::{ItemStatus, PlanStatus, Role};

use crate::auth::RoleToken;
use crate::error::{ApiError, ApiResult};

/// State produced by earlier steps and consumed by later ones.
///
/// Owned by the workflow for one run. Readers go through the `require_*`
/// accessors, which turn a missing value into a validation failure of the
/// reading step instead of a panic.
#[derive(Debug, Default)]
pub struct WorkflowContext {
    tokens: HashMap<Role, RoleToken>,

    /// Code of the plan created by this run
    pub plan_code: Option<String>,

    /// Last plan status observed from the server
    pub plan_status: Option<PlanStatus>,

    /// Item driven through its lifecycle
    pub item_id: Option<i64>,

    /// Last item status observed from the server
    pub item_status: Option<ItemStatus>,
}

impl WorkflowContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_token(&mut self, role: Role, token: RoleToken) {
        self.tokens.insert(role, token);
    }

    pub fn token(&self, role: Role) -> ApiResult<&str> {
        self.tokens
            .get(&role)
            .map(RoleToken::as_str)
            .ok_or_else(|| ApiError::Validation(format!("no {} token in workflow context", role)))
    }

    pub fn require_plan_code(&self) -> ApiResult<&str> {
        self.plan_code
            .as_deref()
            .ok_or_else(|| ApiError::Validation("no plan code in workflow context".to_string()))
    }

    pub fn require_item_id(&self) -> ApiResult<i64> {
        self.item_id
            .ok_or_else(|| ApiError::Validation("no plan item id in workflow context".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_values_are_validation_errors() {
        let ctx = WorkflowContext::new();
        assert!(matches!(ctx.token(Role::Admin), Err(ApiError::Validation(_))));
        assert!(ctx.require_plan_code().is_err());
        assert!(ctx.require_item_id().is_err());
    }

    #[test]
    fn test_populated_values() {
        let mut ctx = WorkflowContext::new();
        ctx.set_token(Role::Doctor, RoleToken::new("t-doc"));
        ctx.plan_code = Some("PLAN-1".into());
        ctx.item_id = Some(42);

        assert_eq!(ctx.token(Role::Doctor).unwrap(), "t-doc");
        assert!(ctx.token(Role::Admin).is_err());
        assert_eq!(ctx.require_plan_code().unwrap(), "PLAN-1");
        assert_eq!(ctx.require_item_id().unwrap(), 42);
    }
}
