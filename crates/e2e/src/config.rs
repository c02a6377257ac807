//! Harness configuration
//!
//! Everything environment-specific lives here: the API base URL, the
//! per-role test accounts, the fixture data used to create entities and
//! the policy for classifying failures. Values come from an optional TOML
//! file, then environment variables, then CLI flags.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use clinicops_common::Role;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::runner::FailurePolicy;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the clinic API (paths are appended verbatim)
    pub base_url: String,

    /// Per-request timeout; transport default when unset
    pub request_timeout_secs: Option<u64>,

    /// Test accounts per role
    pub credentials: RoleCredentials,

    /// Data used by the treatment-plan workflow
    pub treatment_plan: TreatmentPlanFixture,

    /// How errors are classified into SKIP/FAIL
    pub policy: FailurePolicy,

    /// Read-only endpoint checks for the comprehensive workflow
    pub probes: Vec<ProbeSpec>,

    /// Endpoint pairs whose payload shapes should agree
    pub consistency_checks: Vec<ConsistencyCheck>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: None,
            credentials: RoleCredentials::default(),
            treatment_plan: TreatmentPlanFixture::default(),
            policy: FailurePolicy::default(),
            probes: default_probes(),
            consistency_checks: default_consistency_checks(),
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `CLINIC_*` environment overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Recognised keys: `CLINIC_API_BASE_URL` and
    /// `CLINIC_{DOCTOR,ADMIN,RECEPTIONIST}_{USERNAME,PASSWORD}`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CLINIC_API_BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = url;
        }

        for role in Role::ALL {
            let prefix = role.env_prefix();
            let username = lookup(&format!("CLINIC_{prefix}_USERNAME"));
            let password = lookup(&format!("CLINIC_{prefix}_PASSWORD"));
            if username.is_none() && password.is_none() {
                continue;
            }

            let slot = self.credentials.slot_mut(role);
            let creds = slot.get_or_insert_with(|| Credentials {
                username: String::new(),
                password: String::new(),
            });
            if let Some(username) = username {
                creds.username = username;
            }
            if let Some(password) = password {
                creds.password = password;
            }
        }
    }

    /// Check that the configuration can drive a run needing `roles`
    pub fn validate(&self, roles: &[Role]) -> E2eResult<()> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            E2eError::InvalidConfig(format!("base_url '{}' is not a valid URL: {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(E2eError::InvalidConfig(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        for role in roles {
            match self.credentials.get(*role) {
                Some(creds) if !creds.username.is_empty() && !creds.password.is_empty() => {}
                Some(_) => {
                    return Err(E2eError::InvalidConfig(format!(
                        "credentials for role '{}' need both username and password (CLINIC_{}_USERNAME / CLINIC_{}_PASSWORD)",
                        role,
                        role.env_prefix(),
                        role.env_prefix()
                    )));
                }
                None => {
                    return Err(E2eError::InvalidConfig(format!(
                        "no credentials configured for role '{}' (set CLINIC_{}_USERNAME and CLINIC_{}_PASSWORD)",
                        role,
                        role.env_prefix(),
                        role.env_prefix()
                    )));
                }
            }
        }

        if self.treatment_plan.service_codes.len() < 2 {
            return Err(E2eError::InvalidConfig(
                "treatment_plan.service_codes needs at least two entries (one per phase)".to_string(),
            ));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Username/password pair for one role
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleCredentials {
    pub doctor: Option<Credentials>,
    pub admin: Option<Credentials>,
    pub receptionist: Option<Credentials>,
}

impl RoleCredentials {
    pub fn get(&self, role: Role) -> Option<&Credentials> {
        match role {
            Role::Doctor => self.doctor.as_ref(),
            Role::Admin => self.admin.as_ref(),
            Role::Receptionist => self.receptionist.as_ref(),
        }
    }

    fn slot_mut(&mut self, role: Role) -> &mut Option<Credentials> {
        match role {
            Role::Doctor => &mut self.doctor,
            Role::Admin => &mut self.admin,
            Role::Receptionist => &mut self.receptionist,
        }
    }
}

/// Entities the treatment-plan workflow creates plans against
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreatmentPlanFixture {
    pub patient_code: String,
    pub doctor_code: String,
    pub plan_name: String,
    pub payment_type: String,
    /// One service per phase; the first two are used
    pub service_codes: Vec<String>,
    pub item_price: f64,
}

impl Default for TreatmentPlanFixture {
    fn default() -> Self {
        Self {
            patient_code: "BN-1001".to_string(),
            doctor_code: "EMP001".to_string(),
            plan_name: "E2E custom treatment plan".to_string(),
            payment_type: "FULL".to_string(),
            service_codes: vec!["FILLING_COMP".to_string(), "SCALING_L1".to_string()],
            item_price: 500_000.0,
        }
    }
}

impl TreatmentPlanFixture {
    /// Substitute `{patientCode}` and `{doctorCode}` in a path template
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{patientCode}", &self.patient_code)
            .replace("{doctorCode}", &self.doctor_code)
    }
}

/// Expected body shape of a probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeExpect {
    /// JSON array, or a page object with a `content` array
    #[default]
    List,
    /// Any JSON object
    Object,
}

/// A read-only endpoint check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSpec {
    pub module: String,
    pub name: String,
    pub path: String,
    pub role: Role,
    #[serde(default)]
    pub expect: ProbeExpect,
}

/// Two endpoints whose records should use the same field names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub module: String,
    pub name: String,
    pub left: String,
    pub right: String,
    pub role: Role,
}

fn probe(module: &str, name: &str, path: &str, role: Role, expect: ProbeExpect) -> ProbeSpec {
    ProbeSpec {
        module: module.to_string(),
        name: name.to_string(),
        path: path.to_string(),
        role,
        expect,
    }
}

fn default_probes() -> Vec<ProbeSpec> {
    use ProbeExpect::{List, Object};
    vec![
        probe("Appointments", "List appointments", "/api/v1/appointments?page=0&size=10", Role::Receptionist, List),
        probe("Treatment Plans", "List patient treatment plans", "/api/v1/patients/{patientCode}/treatment-plans", Role::Doctor, List),
        probe("Warehouse", "List inventory items", "/api/v1/warehouse/items", Role::Admin, List),
        probe("Warehouse", "List storage transactions", "/api/v1/warehouse/transactions", Role::Admin, List),
        probe("Billing", "List invoices", "/api/v1/invoices", Role::Receptionist, List),
        probe("HR / Time-off", "List time-off requests", "/api/v1/time-off-requests", Role::Admin, List),
        probe("Statistics", "Dashboard statistics", "/api/v1/dashboard/statistics", Role::Admin, Object),
        probe("Services", "List dental services", "/api/v1/services", Role::Receptionist, List),
        probe("Patients", "Get patient", "/api/v1/patients/{patientCode}", Role::Receptionist, Object),
    ]
}

fn default_consistency_checks() -> Vec<ConsistencyCheck> {
    vec![ConsistencyCheck {
        module: "Treatment Plans".to_string(),
        name: "Plan list field naming v1 vs v2".to_string(),
        left: "/api/v1/patients/{patientCode}/treatment-plans".to_string(),
        right: "/api/v2/patients/{patientCode}/treatment-plans".to_string(),
        role: Role::Doctor,
    }]
}
