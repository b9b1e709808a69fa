//! Blocked-status propagation.
//!
//! After any change to a scenario's steps the scenario status is re-derived
//! from a fresh read of its steps, then, when the scenario sits in a
//! package, the package status is re-derived from a fresh read of every
//! scenario in it. Both stages run inside the caller's snapshot, so they
//! commit or roll back together with the change that triggered them.

use serde::Serialize;
use testdeck_core::{
    derive_blocked, derive_package_blocked, next_package_status, next_scenario_status,
    PackageStatus, ScenarioStatus, ScenarioTrigger,
};
use testdeck_storage::TestdeckStorage;

use crate::error::EngineError;
use crate::history::{action, append_history, NewHistoryEntry};
use crate::readers::{load_package, load_scenario};
use crate::snapshot::{abort, commit};

/// One status write made by propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusChange<T> {
    pub id: String,
    pub from: T,
    pub to: T,
}

/// What a propagation run changed. Both fields are `None` for a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PropagationOutcome {
    pub scenario: Option<StatusChange<ScenarioStatus>>,
    pub package: Option<StatusChange<PackageStatus>>,
}

impl PropagationOutcome {
    pub fn is_noop(&self) -> bool {
        self.scenario.is_none() && self.package.is_none()
    }
}

/// Re-derive the blocked status of `scenario_id` and of its package.
pub async fn propagate<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    scenario_id: &str,
    user_id: &str,
) -> Result<PropagationOutcome, EngineError> {
    let aggregate = load_scenario(storage, snapshot, scenario_id).await?;
    let scenario = aggregate.scenario;
    let all_blocked = derive_blocked(aggregate.steps.iter().map(|s| s.status));

    let mut outcome = PropagationOutcome::default();

    match next_scenario_status(scenario.status, ScenarioTrigger::StepsChanged { all_blocked }) {
        Some(next) => {
            storage
                .update_scenario_status(snapshot, &scenario.id, scenario.version, next)
                .await?;
            let (tag, verb) = if next.is_blocked() {
                (action::SCENARIO_BLOCKED, "blocked")
            } else {
                (action::SCENARIO_UNBLOCKED, "unblocked")
            };
            append_history(
                storage,
                snapshot,
                NewHistoryEntry {
                    scenario_id: scenario.id.clone(),
                    user_id: user_id.to_string(),
                    action: tag.to_string(),
                    description: Some(format!("Scenario {verb}: {} -> {}", scenario.status, next)),
                    metadata: Some(serde_json::json!({
                        "from": scenario.status,
                        "to": next,
                    })),
                },
            )
            .await?;
            tracing::info!(
                scenario_id = %scenario.id,
                from = %scenario.status,
                to = %next,
                "scenario status propagated"
            );
            outcome.scenario = Some(StatusChange {
                id: scenario.id.clone(),
                from: scenario.status,
                to: next,
            });
        }
        None => {
            tracing::debug!(
                scenario_id = %scenario.id,
                status = %scenario.status,
                all_blocked,
                "scenario status unchanged"
            );
        }
    }

    if let Some(package_id) = scenario.package_id.as_deref() {
        outcome.package = propagate_package(storage, snapshot, package_id).await?;
    }

    Ok(outcome)
}

async fn propagate_package<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    package_id: &str,
) -> Result<Option<StatusChange<PackageStatus>>, EngineError> {
    let aggregate = load_package(storage, snapshot, package_id).await?;
    let package = aggregate.package;
    let all_blocked = derive_package_blocked(
        aggregate
            .scenarios
            .iter()
            .map(|a| (a.scenario.status, a.steps.iter().map(|s| s.status))),
    );

    let Some(next) = next_package_status(package.status, all_blocked) else {
        tracing::debug!(
            package_id,
            status = %package.status,
            all_blocked,
            "package status unchanged"
        );
        return Ok(None);
    };

    storage
        .update_package_status(snapshot, &package.id, package.version, next)
        .await?;
    tracing::info!(
        package_id,
        from = %package.status,
        to = %next,
        "package status propagated"
    );
    Ok(Some(StatusChange {
        id: package.id,
        from: package.status,
        to: next,
    }))
}

/// Run propagation for a scenario on its own, with no step change.
///
/// Brings a scenario and its package back in line after statuses were
/// written outside the engine, or after a bug moved a blocked scenario to
/// `FAILED`.
pub async fn reconcile_scenario<S: TestdeckStorage>(
    storage: &S,
    scenario_id: &str,
    user_id: &str,
) -> Result<PropagationOutcome, EngineError> {
    let mut snapshot = storage.begin_snapshot().await?;
    let outcome = match propagate(storage, &mut snapshot, scenario_id, user_id).await {
        Ok(outcome) => outcome,
        Err(e) => {
            abort(storage, snapshot, "reconcile_scenario", &e).await;
            return Err(e);
        }
    };
    if outcome.is_noop() {
        let _ = storage.abort_snapshot(snapshot).await;
    } else {
        commit(storage, snapshot, "reconcile_scenario").await?;
    }
    Ok(outcome)
}
