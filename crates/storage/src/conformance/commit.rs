//! Atomic commit conformance tests.
//!
//! A snapshot that touches several tables either lands completely or not
//! at all.

use std::future::Future;

use testdeck_core::{PackageStatus, ScenarioStatus, StepStatus};

use super::{make_history, seed_scenario, TestResult};
use crate::{StorageError, TestdeckStorage};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "multi_table_commit_lands_together",
        multi_table_commit_lands_together(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "conflicting_commit_applies_nothing",
        conflicting_commit_applies_nothing(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "aborted_history_not_recorded",
        aborted_history_not_recorded(factory).await,
    ));

    results
}

/// Step, scenario, package and history writes from one snapshot are all
/// visible after commit.
async fn multi_table_commit_lands_together<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, true).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_step_execution(&mut snap, "st-1", 0, StepStatus::Blocked, None)
        .await
        .map_err(|e| e.to_string())?;
    s.update_scenario_status(&mut snap, "sc-1", 0, ScenarioStatus::Blocked)
        .await
        .map_err(|e| e.to_string())?;
    s.update_package_status(&mut snap, "pkg-1", 0, PackageStatus::Blocked)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_history(&mut snap, make_history("h-1", "sc-1", "SCENARIO_BLOCKED"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let step = s.get_step("st-1").await.map_err(|e| e.to_string())?;
    let scenario = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;
    let package = s.get_package("pkg-1").await.map_err(|e| e.to_string())?;
    let history = s.list_history("sc-1").await.map_err(|e| e.to_string())?;

    if step.status != StepStatus::Blocked
        || scenario.status != ScenarioStatus::Blocked
        || package.status != PackageStatus::Blocked
        || history.len() != 1
    {
        return Err(format!(
            "partial commit: step {} scenario {} package {} history {}",
            step.status,
            scenario.status,
            package.status,
            history.len()
        ));
    }
    Ok(())
}

/// When commit fails on a conflict, none of the snapshot's other writes
/// are applied.
async fn conflicting_commit_applies_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, true).await?;

    let mut loser = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_scenario_for_update(&mut loser, "sc-1")
        .await
        .map_err(|e| e.to_string())?;
    s.update_package_status(&mut loser, "pkg-1", 0, PackageStatus::Blocked)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_history(&mut loser, make_history("h-1", "sc-1", "LOSER"))
        .await
        .map_err(|e| e.to_string())?;

    let mut winner = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_scenario_status(&mut winner, "sc-1", 0, ScenarioStatus::Failed)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(winner)
        .await
        .map_err(|e| format!("winner commit: {e}"))?;

    match s.commit_snapshot(loser).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => return Err("stale snapshot committed".to_string()),
    }

    let package = s.get_package("pkg-1").await.map_err(|e| e.to_string())?;
    if package.status != PackageStatus::Created {
        return Err(format!("package write leaked: {}", package.status));
    }
    let history = s.list_history("sc-1").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err("history write leaked from failed commit".to_string());
    }
    Ok(())
}

async fn aborted_history_not_recorded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_history(&mut snap, make_history("h-1", "sc-1", "NOTE"))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let history = s.list_history("sc-1").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err(format!("expected no history, got {}", history.len()));
    }
    Ok(())
}
