//! In-process fake of the clinic API used by the workflow tests
//!
//! Serves the endpoints the workflows touch from shared in-memory state and
//! records every request. Knobs on [`Behavior`] reproduce backend defects.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header::AUTHORIZATION, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{middleware, Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use clinicops_common::Role;
use clinicops_e2e::config::Credentials;
use clinicops_e2e::{HarnessConfig, Runner};

pub const PLAN_CODE: &str = "PLAN-TEST-001";
pub const FIRST_ITEM_ID: i64 = 100;
pub const PASSWORD: &str = "123456";

const USERS: [&str; 3] = ["doctor1", "admin", "recep"];

/// Defects the fake backend can reproduce
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Raw body served with 200 by the login endpoint
    pub login_body: Option<&'static str>,
    pub create_status: Option<u16>,
    pub submit_status: Option<u16>,
    pub detail_status: Option<u16>,
    /// Move the plan to IN_PROGRESS when an item starts
    pub plan_follows_item: bool,
    /// Serve the v2 plan list with snake_case fields
    pub v2_snake_case: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            login_body: None,
            create_status: None,
            submit_status: None,
            detail_status: None,
            plan_follows_item: true,
            v2_snake_case: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub bearer: Option<String>,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub behavior: Behavior,
    pub plan_status: Option<String>,
    pub items: BTreeMap<i64, String>,
    pub requests: Vec<Recorded>,
}

pub type Shared = Arc<Mutex<FakeState>>;

type ApiReply = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn reject(status: u16, message: &str) -> (StatusCode, Json<Value>) {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(json!({ "statusCode": status, "message": message })))
}

fn plan_json(state: &FakeState) -> Value {
    let phases: Vec<Value> = state
        .items
        .iter()
        .enumerate()
        .map(|(i, (id, status))| {
            json!({
                "phaseNumber": i + 1,
                "phaseName": format!("Phase {}", i + 1),
                "items": [{ "itemId": id, "itemName": "Composite filling", "status": status }]
            })
        })
        .collect();

    json!({
        "planCode": PLAN_CODE,
        "planName": "E2E custom treatment plan",
        "status": state.plan_status.clone().unwrap_or_default(),
        "phases": phases,
    })
}

async fn login(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let raw = state.lock().behavior.login_body;
    if let Some(raw) = raw {
        return (StatusCode::OK, raw).into_response();
    }

    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if USERS.contains(&username) && password == PASSWORD {
        Json(json!({ "token": format!("token-{}", username), "username": username })).into_response()
    } else {
        reject(401, "Bad credentials").into_response()
    }
}

async fn create_plan(State(state): State<Shared>, Json(body): Json<Value>) -> ApiReply {
    let mut state = state.lock();
    if let Some(status) = state.behavior.create_status {
        return Err(reject(status, "could not create plan"));
    }
    let phases = body["phases"].as_array().map(Vec::len).unwrap_or(0);
    state.items = (0..phases as i64)
        .map(|i| (FIRST_ITEM_ID + i, "PENDING".to_string()))
        .collect();
    state.plan_status = Some("DRAFT".to_string());
    Ok(Json(json!({ "statusCode": 201, "message": "Created", "data": plan_json(&state) })))
}

async fn plan_detail(State(state): State<Shared>, Path((_patient, code)): Path<(String, String)>) -> ApiReply {
    let state = state.lock();
    if let Some(status) = state.behavior.detail_status {
        return Err(reject(status, "detail unavailable"));
    }
    if state.plan_status.is_none() || code != PLAN_CODE {
        return Err(reject(404, "plan not found"));
    }
    Ok(Json(plan_json(&state)))
}

async fn plan_list(State(state): State<Shared>) -> ApiReply {
    let state = state.lock();
    Ok(Json(json!({
        "content": [{ "planCode": PLAN_CODE, "status": state.plan_status.clone().unwrap_or_default() }],
        "totalElements": 1
    })))
}

async fn plan_list_v2(State(state): State<Shared>) -> ApiReply {
    let state = state.lock();
    let record = if state.behavior.v2_snake_case {
        json!({ "plan_code": PLAN_CODE, "status": "DRAFT" })
    } else {
        json!({ "planCode": PLAN_CODE, "status": "DRAFT" })
    };
    Ok(Json(json!([record])))
}

async fn submit_for_review(State(state): State<Shared>, Path(_code): Path<String>) -> ApiReply {
    let mut state = state.lock();
    state.plan_status = Some("PENDING_REVIEW".to_string());
    if let Some(status) = state.behavior.submit_status {
        return Err(reject(status, "Internal Server Error"));
    }
    Ok(Json(plan_json(&state)))
}

async fn approve(State(state): State<Shared>, Path(_code): Path<String>, Json(body): Json<Value>) -> ApiReply {
    let mut state = state.lock();
    match body["approvalStatus"].as_str() {
        Some("APPROVED") => {
            state.plan_status = Some("APPROVED".to_string());
            for status in state.items.values_mut() {
                *status = "READY_FOR_BOOKING".to_string();
            }
        }
        Some("REJECTED") => state.plan_status = Some("REJECTED".to_string()),
        _ => return Err(reject(400, "approvalStatus required")),
    }
    Ok(Json(plan_json(&state)))
}

async fn update_item(State(state): State<Shared>, Path(item_id): Path<i64>, Json(body): Json<Value>) -> ApiReply {
    let mut state = state.lock();
    let status = body["status"].as_str().unwrap_or_default().to_string();
    let follows = state.behavior.plan_follows_item;
    let Some(current) = state.items.get_mut(&item_id) else {
        return Err(reject(404, "item not found"));
    };
    *current = status.clone();
    if status == "IN_PROGRESS" && follows {
        state.plan_status = Some("IN_PROGRESS".to_string());
    }
    Ok(Json(json!({ "itemId": item_id, "status": status })))
}

fn router(state: Shared) -> Router {
    let recorder = state.clone();
    let record_layer = middleware::from_fn(move |req: axum::extract::Request, next: middleware::Next| {
        let recorder = recorder.clone();
        async move {
            let bearer = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::to_string);
            recorder.lock().requests.push(Recorded {
                method: req.method().to_string(),
                path: req.uri().path().to_string(),
                bearer,
            });
            next.run(req).await
        }
    });

    Router::new()
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/patients/:patient/treatment-plans", get(plan_list))
        .route("/api/v1/patients/:patient/treatment-plans/custom", post(create_plan))
        .route("/api/v1/patients/:patient/treatment-plans/:code", get(plan_detail))
        .route("/api/v2/patients/:patient/treatment-plans", get(plan_list_v2))
        .route("/api/v1/patient-treatment-plans/:code/submit-for-review", patch(submit_for_review))
        .route("/api/v1/patient-treatment-plans/:code/approval", patch(approve))
        .route("/api/v1/patient-plan-items/:item_id/status", patch(update_item))
        // Module probes
        .route(
            "/api/v1/appointments",
            get(|| async { Json(json!({ "content": [{ "appointmentCode": "APT-1" }], "totalElements": 1 })) }),
        )
        .route("/api/v1/warehouse/items", get(|| async { Json(json!([{ "itemCode": "GLOVE-M" }])) }))
        .route(
            "/api/v1/invoices",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "boom" }))) }),
        )
        .route("/api/v1/time-off-requests", get(|| async { Json(json!([])) }))
        .route("/api/v1/dashboard/statistics", get(|| async { Json(json!({ "revenue": 0 })) }))
        .route("/api/v1/services", get(|| async { Json(json!([{ "serviceCode": "FILLING_COMP" }])) }))
        .route(
            "/api/v1/patients/:patient",
            get(|Path(patient): Path<String>| async move { Json(json!({ "patientCode": patient })) }),
        )
        .layer(record_layer)
        .with_state(state)
}

/// A running fake API bound to an ephemeral local port
pub struct FakeClinic {
    pub base_url: String,
    pub state: Shared,
}

impl FakeClinic {
    pub async fn start(behavior: Behavior) -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            behavior,
            ..Default::default()
        }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake clinic listener");
        let addr = listener.local_addr().expect("fake clinic local addr");
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake clinic server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().requests.clone()
    }

    /// Harness config pointing at this server with every role configured
    pub fn config(&self) -> HarnessConfig {
        let mut config = HarnessConfig {
            base_url: self.base_url.clone(),
            ..Default::default()
        };
        for (role, user) in Role::ALL.into_iter().zip(USERS) {
            let creds = Some(Credentials {
                username: user.to_string(),
                password: PASSWORD.to_string(),
            });
            match role {
                Role::Doctor => config.credentials.doctor = creds,
                Role::Admin => config.credentials.admin = creds,
                Role::Receptionist => config.credentials.receptionist = creds,
            }
        }
        config
    }
}

pub fn quiet_runner(config: &HarnessConfig) -> Runner {
    Runner::new(config.policy.clone()).quiet()
}
