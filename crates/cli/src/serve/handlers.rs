//! Route handlers. Each one decodes its request, calls one engine operation
//! and serializes the result.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use testdeck_core::{BugStatus, Severity, StepStatus};
use testdeck_engine::{
    list_bugs, list_history, read_package, read_scenario, reconcile_scenario, record_history,
    register_bug, replace_steps, update_bug_status, update_step_status, NewBug,
    NewHistoryEntry, NewStep, ReplaceSteps, StepStatusUpdate,
};
use testdeck_storage::TestdeckStorage;

use super::error::ApiError;
use super::json_error;
use super::middleware::{parse_body, ActingUser};
use super::state::AppState;

type JsonBody = Result<Json<serde_json::Value>, JsonRejection>;

// ── Request bodies ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepStatusBody {
    status: String,
    #[serde(default)]
    actual_result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplaceStepsBody {
    steps: Vec<StepBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepBody {
    action: String,
    expected_result: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewBugBody {
    title: String,
    severity: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    related_step_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BugStatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct HistoryBody {
    action: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /scenarios/{id}
pub(crate) async fn handle_get_scenario<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let aggregate = read_scenario(&state.storage, &id).await?;
    Ok(Json(aggregate))
}

/// GET /packages/{id}
pub(crate) async fn handle_get_package<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let aggregate = read_package(&state.storage, &id).await?;
    Ok(Json(aggregate))
}

/// PUT /steps/{id}/status
pub(crate) async fn handle_step_status<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ActingUser(user_id): ActingUser,
    body: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let body: StepStatusBody = parse_body(body)?;
    let status: StepStatus = body.status.parse()?;
    let outcome = update_step_status(
        &state.storage,
        StepStatusUpdate {
            step_id: id,
            status,
            actual_result: body.actual_result,
            user_id,
        },
    )
    .await?;
    Ok(Json(outcome))
}

/// PUT /scenarios/{id}/steps
pub(crate) async fn handle_replace_steps<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ActingUser(user_id): ActingUser,
    body: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let body: ReplaceStepsBody = parse_body(body)?;
    let steps = body
        .steps
        .into_iter()
        .map(|s| NewStep {
            action: s.action,
            expected_result: s.expected_result,
        })
        .collect();
    let outcome = replace_steps(
        &state.storage,
        ReplaceSteps {
            scenario_id: id,
            steps,
            user_id,
        },
    )
    .await?;
    Ok(Json(outcome.scenario))
}

/// POST /scenarios/{id}/reconcile
pub(crate) async fn handle_reconcile<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ActingUser(user_id): ActingUser,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = reconcile_scenario(&state.storage, &id, &user_id).await?;
    Ok(Json(outcome))
}

/// POST /scenarios/{id}/bugs
pub(crate) async fn handle_create_bug<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ActingUser(user_id): ActingUser,
    body: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let body: NewBugBody = parse_body(body)?;
    let severity: Severity = body.severity.parse()?;
    let bug = register_bug(
        &state.storage,
        NewBug {
            scenario_id: id,
            title: body.title,
            description: body.description,
            severity,
            related_step_id: body.related_step_id,
            user_id,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(bug)))
}

/// GET /scenarios/{id}/bugs
pub(crate) async fn handle_list_bugs<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bugs = list_bugs(&state.storage, &id).await?;
    Ok(Json(serde_json::json!({ "bugs": bugs })))
}

/// PUT /bugs/{id}/status
pub(crate) async fn handle_bug_status<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ActingUser(user_id): ActingUser,
    body: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let body: BugStatusBody = parse_body(body)?;
    let status: BugStatus = body.status.parse()?;
    let bug = update_bug_status(&state.storage, &id, status, &user_id).await?;
    Ok(Json(bug))
}

/// POST /scenarios/{id}/history
pub(crate) async fn handle_add_history<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    ActingUser(user_id): ActingUser,
    body: JsonBody,
) -> Result<impl IntoResponse, ApiError> {
    let body: HistoryBody = parse_body(body)?;
    let entry = record_history(
        &state.storage,
        NewHistoryEntry {
            scenario_id: id,
            user_id,
            action: body.action,
            description: body.description,
            metadata: body.metadata,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// GET /scenarios/{id}/history
pub(crate) async fn handle_list_history<S: TestdeckStorage>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let history = list_history(&state.storage, &id).await?;
    Ok(Json(serde_json::json!({ "history": history })))
}
