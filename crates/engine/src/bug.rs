//! Bug registration and bug status changes.

use testdeck_core::{next_scenario_status, BugStatus, ScenarioTrigger, Severity};
use testdeck_storage::{BugRecord, TestdeckStorage};

use crate::error::EngineError;
use crate::history::{action, append_history, NewHistoryEntry};
use crate::ids::{new_id, now_rfc3339};
use crate::snapshot::{abort, commit};

/// Input for [`register_bug`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewBug {
    pub scenario_id: String,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub related_step_id: Option<String>,
    pub user_id: String,
}

/// Create a bug against a scenario and mark the scenario `FAILED`.
///
/// The status change goes through the same transition rule as
/// propagation: a blocked scenario also moves to `FAILED`. One
/// `BUG_CREATED` history entry is written whether or not the status moved.
pub async fn register_bug<S: TestdeckStorage>(
    storage: &S,
    bug: NewBug,
) -> Result<BugRecord, EngineError> {
    if bug.title.trim().is_empty() {
        return Err(EngineError::validation("bug title must not be blank"));
    }

    let mut snapshot = storage.begin_snapshot().await?;
    let record = match apply_register_bug(storage, &mut snapshot, bug).await {
        Ok(record) => record,
        Err(e) => {
            abort(storage, snapshot, "register_bug", &e).await;
            return Err(e);
        }
    };
    commit(storage, snapshot, "register_bug").await?;
    Ok(record)
}

async fn apply_register_bug<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    bug: NewBug,
) -> Result<BugRecord, EngineError> {
    let scenario = storage
        .get_scenario_for_update(snapshot, &bug.scenario_id)
        .await?;

    if let Some(step_id) = bug.related_step_id.as_deref() {
        let step = storage.get_step_for_update(snapshot, step_id).await?;
        if step.scenario_id != scenario.id {
            return Err(EngineError::validation(format!(
                "step '{step_id}' does not belong to scenario '{}'",
                scenario.id
            )));
        }
    }

    let record = BugRecord {
        id: new_id("bug"),
        scenario_id: scenario.id.clone(),
        related_step_id: bug.related_step_id,
        title: bug.title,
        description: bug.description,
        severity: bug.severity,
        status: BugStatus::Open,
        created_by: bug.user_id.clone(),
        created_at: now_rfc3339(),
        version: 0,
    };
    storage.insert_bug(snapshot, record.clone()).await?;

    if let Some(next) = next_scenario_status(scenario.status, ScenarioTrigger::BugRaised) {
        storage
            .update_scenario_status(snapshot, &scenario.id, scenario.version, next)
            .await?;
        tracing::info!(
            scenario_id = %scenario.id,
            from = %scenario.status,
            to = %next,
            "scenario failed by bug"
        );
    }

    append_history(
        storage,
        snapshot,
        NewHistoryEntry {
            scenario_id: scenario.id.clone(),
            user_id: bug.user_id,
            action: action::BUG_CREATED.to_string(),
            description: Some(format!("Bug created: {}", record.title)),
            metadata: Some(serde_json::json!({
                "bugId": record.id,
                "severity": record.severity,
                "relatedStepId": record.related_step_id,
            })),
        },
    )
    .await?;
    tracing::info!(
        bug_id = %record.id,
        scenario_id = %scenario.id,
        severity = %record.severity,
        "bug registered"
    );

    Ok(record)
}

/// Move a bug to a new status. Setting the status it already has is a no-op.
///
/// Bug status changes never touch the scenario status.
pub async fn update_bug_status<S: TestdeckStorage>(
    storage: &S,
    bug_id: &str,
    status: BugStatus,
    user_id: &str,
) -> Result<BugRecord, EngineError> {
    let mut snapshot = storage.begin_snapshot().await?;
    let result = apply_bug_status(storage, &mut snapshot, bug_id, status, user_id).await;
    match result {
        Ok(Some(record)) => {
            commit(storage, snapshot, "update_bug_status").await?;
            Ok(record)
        }
        Ok(None) => {
            let _ = storage.abort_snapshot(snapshot).await;
            Ok(storage.get_bug(bug_id).await?)
        }
        Err(e) => {
            abort(storage, snapshot, "update_bug_status", &e).await;
            Err(e)
        }
    }
}

async fn apply_bug_status<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    bug_id: &str,
    status: BugStatus,
    user_id: &str,
) -> Result<Option<BugRecord>, EngineError> {
    let current = storage.get_bug_for_update(snapshot, bug_id).await?;
    if current.status == status {
        return Ok(None);
    }
    let version = storage
        .update_bug_status(snapshot, bug_id, current.version, status)
        .await?;
    append_history(
        storage,
        snapshot,
        NewHistoryEntry {
            scenario_id: current.scenario_id.clone(),
            user_id: user_id.to_string(),
            action: action::BUG_STATUS_CHANGED.to_string(),
            description: Some(format!("Bug {}: {} -> {}", current.id, current.status, status)),
            metadata: Some(serde_json::json!({
                "bugId": current.id,
                "from": current.status,
                "to": status,
            })),
        },
    )
    .await?;
    tracing::info!(bug_id, from = %current.status, to = %status, "bug status changed");

    Ok(Some(BugRecord {
        status,
        version,
        ..current
    }))
}

/// Bugs of a scenario, oldest first.
pub async fn list_bugs<S: TestdeckStorage>(
    storage: &S,
    scenario_id: &str,
) -> Result<Vec<BugRecord>, EngineError> {
    storage.get_scenario(scenario_id).await?;
    Ok(storage.list_bugs(scenario_id).await?)
}
