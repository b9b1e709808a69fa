//! Snapshot isolation conformance tests.
//!
//! Verifies that uncommitted writes are invisible outside a snapshot,
//! committed writes are visible, and aborted or dropped writes are discarded.

use std::future::Future;

use testdeck_core::{ScenarioStatus, StepStatus};

use super::{make_step, seed_scenario, TestResult};
use crate::{StorageError, TestdeckStorage};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_insert_invisible",
        uncommitted_insert_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_update_invisible",
        uncommitted_update_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "committed_update_visible",
        committed_update_visible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "abort_discards_update",
        abort_discards_update(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "drop_discards_update",
        drop_discards_update(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "reads_see_own_staged_writes",
        reads_see_own_staged_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "list_for_update_sees_staged_steps",
        list_for_update_sees_staged_steps(factory).await,
    ));

    results
}

async fn uncommitted_insert_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_step(&mut snap, make_step("st-1", "sc-1", 1))
        .await
        .map_err(|e| e.to_string())?;

    match s.get_step("st-1").await {
        Err(StorageError::NotFound { .. }) => {}
        Err(e) => return Err(format!("expected NotFound, got {e}")),
        Ok(_) => return Err("uncommitted step visible outside snapshot".to_string()),
    }
    let listed = s.list_steps("sc-1").await.map_err(|e| e.to_string())?;
    if !listed.is_empty() {
        return Err("uncommitted step visible to list_steps".to_string());
    }
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())
}

async fn uncommitted_update_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_step_execution(&mut snap, "st-1", 0, StepStatus::Blocked, None)
        .await
        .map_err(|e| e.to_string())?;

    let rec = s.get_step("st-1").await.map_err(|e| e.to_string())?;
    if rec.status != StepStatus::Pending {
        return Err(format!("expected PENDING outside snapshot, got {}", rec.status));
    }
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())
}

async fn committed_update_visible<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_step_execution(
        &mut snap,
        "st-1",
        0,
        StepStatus::Failed,
        Some("crashed".to_string()),
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_step("st-1").await.map_err(|e| e.to_string())?;
    if rec.status != StepStatus::Failed || rec.actual_result.as_deref() != Some("crashed") {
        return Err(format!(
            "expected FAILED/crashed, got {}/{:?}",
            rec.status, rec.actual_result
        ));
    }
    Ok(())
}

async fn abort_discards_update<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_scenario_status(&mut snap, "sc-1", 0, ScenarioStatus::Blocked)
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;
    if rec.status != ScenarioStatus::Created || rec.version != 0 {
        return Err(format!(
            "expected CREATED at v0 after abort, got {} at v{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

async fn drop_discards_update<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.update_scenario_status(&mut snap, "sc-1", 0, ScenarioStatus::Blocked)
            .await
            .map_err(|e| e.to_string())?;
        // Dropped here without commit.
    }

    let rec = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;
    if rec.status != ScenarioStatus::Created {
        return Err(format!("expected CREATED after drop, got {}", rec.status));
    }
    Ok(())
}

async fn reads_see_own_staged_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_scenario_status(&mut snap, "sc-1", 0, ScenarioStatus::Passed)
        .await
        .map_err(|e| e.to_string())?;
    let rec = s
        .get_scenario_for_update(&mut snap, "sc-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if rec.status != ScenarioStatus::Passed || rec.version != 1 {
        return Err(format!(
            "expected staged PASSED at v1, got {} at v{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

async fn list_for_update_sees_staged_steps<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 2, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_step_execution(&mut snap, "st-2", 0, StepStatus::Blocked, None)
        .await
        .map_err(|e| e.to_string())?;
    s.insert_step(&mut snap, make_step("st-3", "sc-1", 3))
        .await
        .map_err(|e| e.to_string())?;
    let steps = s
        .list_steps_for_update(&mut snap, "sc-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let summary: Vec<(&str, StepStatus)> =
        steps.iter().map(|st| (st.id.as_str(), st.status)).collect();
    let expected = [
        ("st-1", StepStatus::Pending),
        ("st-2", StepStatus::Blocked),
        ("st-3", StepStatus::Pending),
    ];
    if summary != expected {
        return Err(format!("unexpected staged step list: {summary:?}"));
    }
    Ok(())
}
