//! API routes for caseflowd
//!
//! Role-scoped entry points over the lifecycle engine. The upstream
//! identity layer authenticates requests and presents the actor as
//! headers (x-user-id, x-user-role, x-org-unit); handlers turn those into
//! an explicit Actor value and never consult ambient state.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use caseflow_common::{
    Actor, Case, CaseIntent, CaseStatusEvent, Role, TransitionPayload, WorkflowError,
};

use crate::server::AppState;
use crate::store::{CaseDetail, CaseReport, UserRecord};

type AppStateArc = Arc<AppState>;

// ============================================================================
// Wire types
// ============================================================================

/// Error body for every rejection
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable kind
    pub error: String,
    pub message: String,
}

type Rejection = (StatusCode, Json<ErrorBody>);

fn reject(err: WorkflowError) -> Rejection {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorBody {
            error: err.kind().to_string(),
            message: err.to_string(),
        }),
    )
}

fn forbidden(message: &str) -> Rejection {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorBody {
            error: "forbidden".to_string(),
            message: message.to_string(),
        }),
    )
}

/// Resolve the actor the identity layer attached upstream
fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, Rejection> {
    let header = |name: &'static str| -> Result<String, Rejection> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| v.to_string())
            .ok_or_else(|| {
                reject(WorkflowError::Validation {
                    field: name,
                    problem: "header required".to_string(),
                })
            })
    };

    let user_id = header("x-user-id")?;
    let role_value = header("x-user-role")?;
    let org_unit_id = header("x-org-unit")?;
    let role = Role::parse(&role_value).ok_or_else(|| {
        reject(WorkflowError::Validation {
            field: "x-user-role",
            problem: format!("unknown role '{role_value}'"),
        })
    })?;
    Ok(Actor::new(&user_id, role, &org_unit_id))
}

#[derive(Debug, Deserialize)]
struct CreateCaseRequest {
    title: String,
    #[serde(default)]
    summary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReasonBody {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignRequest {
    investigator_id: String,
    deadline: DateTime<Utc>,
    #[serde(default)]
    is_lead: bool,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CourtSubmitBody {
    #[serde(default)]
    court_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    court_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CourtAssignBackRequest {
    investigator_id: String,
    deadline: DateTime<Utc>,
    #[serde(default)]
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CloseRequest {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    outcome_code: Option<String>,
    #[serde(default)]
    outcome_description: Option<String>,
    #[serde(default)]
    court_decision_ref: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpsertUserRequest {
    id: String,
    username: String,
    role: String,
    org_unit_id: String,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

/// Updated case plus the assignment the transition touched, if any
#[derive(Debug, Serialize)]
struct TransitionResponse {
    case: Case,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignment_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

// ============================================================================
// Case Routes
// ============================================================================

pub fn case_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/cases", post(create_case))
        .route("/v1/cases/:id", get(get_case))
        .route("/v1/cases/:id/history", get(get_history))
        .route("/v1/cases/:id/submit", post(submit_case))
        .route("/v1/cases/:id/approve", post(approve_case))
        .route("/v1/cases/:id/return", post(return_case))
        .route("/v1/cases/:id/assignments", post(assign_investigator))
        .route("/v1/cases/:id/escalate", post(escalate_case))
        .route("/v1/cases/:id/court/submit", post(submit_to_court))
        .route("/v1/cases/:id/court/assign-back", post(court_assign_back))
        .route("/v1/cases/:id/court/close", post(court_close))
        .route("/v1/cases/:id/close", post(close_case))
        .route("/v1/cases/:id/reopen", post(reopen_case))
}

async fn create_case(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<CreateCaseRequest>,
) -> Result<(StatusCode, Json<Case>), Rejection> {
    let actor = actor_from_headers(&headers)?;
    if actor.role != Role::ObOfficer {
        return Err(forbidden("only the OB desk records new cases"));
    }
    if req.title.trim().is_empty() {
        return Err(reject(WorkflowError::Validation {
            field: "title",
            problem: "required".to_string(),
        }));
    }

    let case = state
        .store
        .create_case(
            &actor.org_unit_id,
            req.title.trim(),
            req.summary.as_deref(),
            &actor.user_id,
        )
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(case)))
}

async fn get_case(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
) -> Result<Json<CaseDetail>, Rejection> {
    let detail = state
        .store
        .get_case_detail(&case_id)
        .await
        .map_err(reject)?
        .ok_or_else(|| {
            reject(WorkflowError::NotFound {
                entity: "case",
                id: case_id.clone(),
            })
        })?;
    Ok(Json(detail))
}

async fn get_history(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
) -> Result<Json<Vec<CaseStatusEvent>>, Rejection> {
    let events = state
        .store
        .get_history(&case_id)
        .await
        .map_err(reject)?
        .ok_or_else(|| {
            reject(WorkflowError::NotFound {
                entity: "case",
                id: case_id.clone(),
            })
        })?;
    Ok(Json(events))
}

/// Shared tail of every transition handler
async fn run_transition(
    state: &AppStateArc,
    headers: &HeaderMap,
    case_id: &str,
    intent: CaseIntent,
    payload: TransitionPayload,
) -> Result<Json<TransitionResponse>, Rejection> {
    let actor = actor_from_headers(headers)?;
    let receipt = state
        .engine
        .request_transition(case_id, intent, &actor, payload)
        .await
        .map_err(reject)?;
    state.dispatcher.dispatch(receipt.notifications);
    Ok(Json(TransitionResponse {
        case: receipt.case,
        assignment_id: receipt.assignment_id,
    }))
}

async fn submit_case(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TransitionResponse>, Rejection> {
    run_transition(&state, &headers, &case_id, CaseIntent::Submit, TransitionPayload::default())
        .await
}

async fn approve_case(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let payload = TransitionPayload {
        reason: body.and_then(|Json(b)| b.reason),
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::Approve, payload).await
}

async fn return_case(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let payload = TransitionPayload {
        reason: body.and_then(|Json(b)| b.reason),
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::ReturnForRevision, payload).await
}

async fn assign_investigator(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<AssignRequest>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let payload = TransitionPayload {
        investigator_id: Some(req.investigator_id),
        deadline: Some(req.deadline),
        is_lead: req.is_lead,
        priority: req.priority,
        notes: req.notes,
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::AssignInvestigators, payload).await
}

async fn escalate_case(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<TransitionResponse>, Rejection> {
    run_transition(
        &state,
        &headers,
        &case_id,
        CaseIntent::EscalateToCourt,
        TransitionPayload::default(),
    )
    .await
}

async fn submit_to_court(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<CourtSubmitBody>>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let payload = TransitionPayload {
        court_deadline: body.court_deadline,
        court_notes: body.court_notes,
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::SubmitToCourt, payload).await
}

async fn court_assign_back(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CourtAssignBackRequest>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let payload = TransitionPayload {
        investigator_id: Some(req.investigator_id),
        deadline: Some(req.deadline),
        notes: req.notes,
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::CourtAssignBack, payload).await
}

async fn court_close(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CloseRequest>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let payload = TransitionPayload {
        reason: req.reason,
        outcome_code: req.outcome_code,
        outcome_description: req.outcome_description,
        court_decision_ref: req.court_decision_ref,
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::CourtClose, payload).await
}

async fn close_case(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<CloseRequest>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let payload = TransitionPayload {
        reason: req.reason,
        outcome_code: req.outcome_code,
        outcome_description: req.outcome_description,
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::Close, payload).await
}

async fn reopen_case(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<ReasonBody>>,
) -> Result<Json<TransitionResponse>, Rejection> {
    let payload = TransitionPayload {
        reason: body.and_then(|Json(b)| b.reason),
        ..Default::default()
    };
    run_transition(&state, &headers, &case_id, CaseIntent::Reopen, payload).await
}

// ============================================================================
// Report Routes
// ============================================================================

pub fn report_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/cases/:id/report", post(file_report))
        .route("/v1/cases/:id/report/sign", post(sign_report))
}

async fn file_report(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<CaseReport>), Rejection> {
    let actor = actor_from_headers(&headers)?;
    if actor.role != Role::Investigator {
        return Err(forbidden("only investigators file the final report"));
    }
    let report = state
        .store
        .file_final_report(&case_id, &actor.user_id)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(report)))
}

async fn sign_report(
    State(state): State<AppStateArc>,
    Path(case_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<CaseReport>, Rejection> {
    let actor = actor_from_headers(&headers)?;
    if !matches!(actor.role, Role::StationAdmin | Role::Admin | Role::SuperAdmin) {
        return Err(forbidden("only station administration signs the final report"));
    }
    let report = state
        .store
        .sign_final_report(&case_id, &actor.user_id)
        .await
        .map_err(reject)?;
    Ok(Json(report))
}

// ============================================================================
// User Routes
// ============================================================================

pub fn user_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/users", post(upsert_user))
}

async fn upsert_user(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<UpsertUserRequest>,
) -> Result<StatusCode, Rejection> {
    let actor = actor_from_headers(&headers)?;
    if actor.role != Role::SuperAdmin {
        return Err(forbidden("only a super admin manages the user directory"));
    }
    let role = Role::parse(&req.role).ok_or_else(|| {
        reject(WorkflowError::Validation {
            field: "role",
            problem: format!("unknown role '{}'", req.role),
        })
    })?;
    state
        .store
        .upsert_user(&UserRecord {
            id: req.id,
            username: req.username,
            role,
            org_unit_id: req.org_unit_id,
            active: req.active,
        })
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health))
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
