//! Credential exchange for role tokens

use std::fmt;

use clinicops_common::LoginRequest;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

use crate::client::ApiClient;
use crate::config::Credentials;
use crate::error::{ApiError, ApiResult};

pub const LOGIN_PATH: &str = "/api/v1/auth/login";

/// Opaque bearer token scoped to one role for the duration of a run
#[derive(Clone, PartialEq, Eq)]
pub struct RoleToken(String);

impl RoleToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RoleToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RoleToken(<{} chars>)", self.0.len())
    }
}

// Tokens end up in step data and JSON reports
impl Serialize for RoleToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

/// Exchange a username/password pair for a bearer token.
///
/// Single attempt; the caller decides whether a failure aborts the run.
pub async fn login(client: &ApiClient, credentials: &Credentials) -> ApiResult<RoleToken> {
    if credentials.username.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::Validation("username and password must be non-empty".to_string()));
    }

    let request = LoginRequest {
        username: credentials.username.clone(),
        password: credentials.password.clone(),
    };
    let body = client.post(LOGIN_PATH, &request, None).await?;

    let token = extract_token(&body).ok_or_else(|| {
        ApiError::Validation("login response carries no token".to_string())
    })?;
    debug!("Authenticated {}", credentials.username);
    Ok(RoleToken::new(token))
}

/// Find the bearer token in the shapes the login endpoint is known to return
fn extract_token(body: &Value) -> Option<String> {
    const FIELDS: &[&str] = &["token", "accessToken", "access_token"];

    let candidates = [Some(body), body.get("data")];
    candidates
        .into_iter()
        .flatten()
        .flat_map(|obj| FIELDS.iter().filter_map(move |f| obj.get(*f)))
        .filter_map(Value::as_str)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}
