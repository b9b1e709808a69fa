//! Step outcome updates and step-set replacement.

use serde::Serialize;
use testdeck_core::StepStatus;
use testdeck_storage::{StepRecord, TestdeckStorage};

use crate::error::EngineError;
use crate::history::{action, append_history, NewHistoryEntry};
use crate::ids::new_id;
use crate::propagation::{propagate, PropagationOutcome};
use crate::readers::{load_scenario, ScenarioAggregate};
use crate::snapshot::{abort, commit};

/// A request to record a step's execution outcome.
///
/// `actual_result: None` keeps whatever actual result the step already has;
/// it never clears it.
#[derive(Debug, Clone, PartialEq)]
pub struct StepStatusUpdate {
    pub step_id: String,
    pub status: StepStatus,
    pub actual_result: Option<String>,
    pub user_id: String,
}

/// Serializes as the step's own fields plus a `propagation` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepStatusOutcome {
    #[serde(flatten)]
    pub step: StepRecord,
    pub propagation: PropagationOutcome,
}

/// Persist a step outcome and propagate it to the scenario and package.
pub async fn update_step_status<S: TestdeckStorage>(
    storage: &S,
    update: StepStatusUpdate,
) -> Result<StepStatusOutcome, EngineError> {
    let mut snapshot = storage.begin_snapshot().await?;
    let outcome = match apply_step_status(storage, &mut snapshot, update).await {
        Ok(outcome) => outcome,
        Err(e) => {
            abort(storage, snapshot, "update_step_status", &e).await;
            return Err(e);
        }
    };
    commit(storage, snapshot, "update_step_status").await?;
    Ok(outcome)
}

async fn apply_step_status<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    update: StepStatusUpdate,
) -> Result<StepStatusOutcome, EngineError> {
    let current = storage
        .get_step_for_update(snapshot, &update.step_id)
        .await?;
    let actual_result = update.actual_result.or(current.actual_result);
    let version = storage
        .update_step_execution(
            snapshot,
            &current.id,
            current.version,
            update.status,
            actual_result.clone(),
        )
        .await?;
    tracing::info!(
        step_id = %current.id,
        scenario_id = %current.scenario_id,
        from = %current.status,
        to = %update.status,
        "step status updated"
    );

    let step = StepRecord {
        status: update.status,
        actual_result,
        version,
        ..current
    };
    let propagation = propagate(storage, snapshot, &step.scenario_id, &update.user_id).await?;
    Ok(StepStatusOutcome { step, propagation })
}

/// One step of a replacement step set.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStep {
    pub action: String,
    pub expected_result: String,
}

/// A request to replace every step of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceSteps {
    pub scenario_id: String,
    pub steps: Vec<NewStep>,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceStepsOutcome {
    pub scenario: ScenarioAggregate,
    pub propagation: PropagationOutcome,
}

/// Replace a scenario's steps with a fresh, pending set numbered from 1.
///
/// Propagation runs afterwards, so replacing the steps of a blocked scenario
/// with anything that is not all blocked (including nothing) unblocks it.
pub async fn replace_steps<S: TestdeckStorage>(
    storage: &S,
    request: ReplaceSteps,
) -> Result<ReplaceStepsOutcome, EngineError> {
    for (i, step) in request.steps.iter().enumerate() {
        if step.action.trim().is_empty() {
            return Err(EngineError::validation(format!(
                "step {}: action must not be blank",
                i + 1
            )));
        }
        if step.expected_result.trim().is_empty() {
            return Err(EngineError::validation(format!(
                "step {}: expected result must not be blank",
                i + 1
            )));
        }
    }

    let mut snapshot = storage.begin_snapshot().await?;
    let outcome = match apply_replace_steps(storage, &mut snapshot, request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            abort(storage, snapshot, "replace_steps", &e).await;
            return Err(e);
        }
    };
    commit(storage, snapshot, "replace_steps").await?;
    Ok(outcome)
}

async fn apply_replace_steps<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    request: ReplaceSteps,
) -> Result<ReplaceStepsOutcome, EngineError> {
    let scenario = storage
        .get_scenario_for_update(snapshot, &request.scenario_id)
        .await?;
    let previous = storage
        .list_steps_for_update(snapshot, &scenario.id)
        .await?
        .len();

    let records: Vec<StepRecord> = request
        .steps
        .into_iter()
        .zip(1u32..)
        .map(|(step, ordinal)| StepRecord {
            id: new_id("step"),
            scenario_id: scenario.id.clone(),
            ordinal,
            action: step.action,
            expected_result: step.expected_result,
            actual_result: None,
            status: StepStatus::Pending,
            version: 0,
        })
        .collect();
    let count = records.len();

    storage
        .replace_steps(snapshot, &scenario.id, scenario.version, records)
        .await?;
    append_history(
        storage,
        snapshot,
        NewHistoryEntry {
            scenario_id: scenario.id.clone(),
            user_id: request.user_id.clone(),
            action: action::STEPS_REPLACED.to_string(),
            description: Some(format!("Steps replaced: {previous} -> {count}")),
            metadata: Some(serde_json::json!({
                "previousCount": previous,
                "stepCount": count,
            })),
        },
    )
    .await?;
    tracing::info!(scenario_id = %scenario.id, previous, count, "scenario steps replaced");

    let propagation = propagate(storage, snapshot, &scenario.id, &request.user_id).await?;
    let scenario = load_scenario(storage, snapshot, &scenario.id).await?;
    Ok(ReplaceStepsOutcome {
        scenario,
        propagation,
    })
}
