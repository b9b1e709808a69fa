use std::future::Future;

use testdeck_core::{BugStatus, ScenarioStatus, Severity, StepStatus};

use super::{make_step, seed_scenario, TestResult};
use crate::record::BugRecord;
use crate::{EntityKind, StorageError, TestdeckStorage};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    // Basic version tracking
    results.push(TestResult::from_result(
        "version",
        "version_increments_sequentially",
        version_increments_sequentially(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "bug_status_update_increments_version",
        bug_status_update_increments_version(factory).await,
    ));

    // Wrong version fails
    results.push(TestResult::from_result(
        "version",
        "update_with_wrong_version_returns_conflict",
        update_with_wrong_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_has_correct_fields",
        conflict_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_version_after_intervening_commit",
        stale_version_after_intervening_commit(factory).await,
    ));

    // Race conditions (sequential simulation)
    results.push(TestResult::from_result(
        "version",
        "two_snapshots_race_one_wins",
        two_snapshots_race_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "read_set_change_fails_commit",
        read_set_change_fails_commit(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "replace_steps_bumps_scenario_version",
        replace_steps_bumps_scenario_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "replace_steps_conflicts_with_step_reader",
        replace_steps_conflicts_with_step_reader(factory).await,
    ));

    results
}

// ── Basic version tracking ───────────────────────────────────────────────────

/// Three successive step updates must yield versions 0 -> 1 -> 2 -> 3.
async fn version_increments_sequentially<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, false).await?;
    let outcomes = [StepStatus::Blocked, StepStatus::Passed, StepStatus::Failed];

    for (i, outcome) in outcomes.iter().enumerate() {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        let new_version = s
            .update_step_execution(&mut snap, "st-1", i as i64, *outcome, None)
            .await
            .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

        if new_version != i as i64 + 1 {
            return Err(format!(
                "update {} returned version {new_version}, expected {}",
                i + 1,
                i + 1
            ));
        }
        let rec = s.get_step("st-1").await.map_err(|e| e.to_string())?;
        if rec.version != i as i64 + 1 || rec.status != *outcome {
            return Err(format!(
                "after update {}: got {} at v{}",
                i + 1,
                rec.status,
                rec.version
            ));
        }
    }
    Ok(())
}

async fn bug_status_update_increments_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_bug(
        &mut snap,
        BugRecord {
            id: "bug-1".to_string(),
            scenario_id: "sc-1".to_string(),
            related_step_id: Some("st-1".to_string()),
            title: "Login button dead".to_string(),
            description: None,
            severity: Severity::High,
            status: BugStatus::Open,
            created_by: "user-1".to_string(),
            created_at: "2025-01-01T00:00:00Z".to_string(),
            version: 0,
        },
    )
    .await
    .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let v = s
        .update_bug_status(&mut snap, "bug-1", 0, BugStatus::Resolved)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_bug("bug-1").await.map_err(|e| e.to_string())?;
    if v != 1 || rec.version != 1 || rec.status != BugStatus::Resolved {
        return Err(format!(
            "expected RESOLVED at v1, got {} at v{} (returned {v})",
            rec.status, rec.version
        ));
    }
    Ok(())
}

// ── Wrong version fails ──────────────────────────────────────────────────────

async fn update_with_wrong_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_scenario_status(&mut snap, "sc-1", 1, ScenarioStatus::Failed)
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(v) => Err(format!("expected ConcurrentConflict, got Ok({v})")),
    }
}

async fn conflict_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_step_execution(&mut snap, "st-1", 7, StepStatus::Passed, None)
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict {
            kind,
            id,
            expected_version,
        }) => {
            if kind != EntityKind::Step || id != "st-1" || expected_version != 7 {
                return Err(format!(
                    "unexpected conflict fields: {kind} {id} v{expected_version}"
                ));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(v) => Err(format!("expected ConcurrentConflict, got Ok({v})")),
    }
}

/// A version read before someone else's commit is rejected afterwards.
async fn stale_version_after_intervening_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let stale = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_scenario_status(&mut snap, "sc-1", stale.version, ScenarioStatus::Passed)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_scenario_status(&mut snap, "sc-1", stale.version, ScenarioStatus::Failed)
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(v) => Err(format!("stale update accepted, new version {v}")),
    }
}

// ── Race conditions (sequential simulation) ──────────────────────────────────

/// Two snapshots update the same row from the same version; the second
/// commit must fail and the state must reflect the first.
async fn two_snapshots_race_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut a = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let mut b = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_scenario_status(&mut a, "sc-1", 0, ScenarioStatus::Blocked)
        .await
        .map_err(|e| format!("a update: {e}"))?;
    s.update_scenario_status(&mut b, "sc-1", 0, ScenarioStatus::Failed)
        .await
        .map_err(|e| format!("b update: {e}"))?;

    s.commit_snapshot(a)
        .await
        .map_err(|e| format!("a commit: {e}"))?;
    match s.commit_snapshot(b).await {
        Err(StorageError::ConcurrentConflict { .. }) => {}
        Err(e) => return Err(format!("expected ConcurrentConflict for b, got {e}")),
        Ok(()) => return Err("both racing snapshots committed".to_string()),
    }

    let rec = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;
    if rec.status != ScenarioStatus::Blocked || rec.version != 1 {
        return Err(format!(
            "expected winner BLOCKED at v1, got {} at v{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}

/// A snapshot that only read a row still conflicts if that row changed
/// before it committed.
async fn read_set_change_fails_commit<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 2, false).await?;

    let mut reader = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.list_steps_for_update(&mut reader, "sc-1")
        .await
        .map_err(|e| e.to_string())?;
    s.update_scenario_status(&mut reader, "sc-1", 0, ScenarioStatus::Blocked)
        .await
        .map_err(|e| e.to_string())?;

    let mut writer = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_step_execution(&mut writer, "st-2", 0, StepStatus::Passed, None)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(writer).await.map_err(|e| e.to_string())?;

    match s.commit_snapshot(reader).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => Err("commit based on a stale step list succeeded".to_string()),
    }
}

async fn replace_steps_bumps_scenario_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 3, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let v = s
        .replace_steps(
            &mut snap,
            "sc-1",
            0,
            vec![make_step("new-1", "sc-1", 1), make_step("new-2", "sc-1", 2)],
        )
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let scenario = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;
    let steps = s.list_steps("sc-1").await.map_err(|e| e.to_string())?;
    let ids: Vec<&str> = steps.iter().map(|st| st.id.as_str()).collect();
    if v != 1 || scenario.version != 1 {
        return Err(format!(
            "expected scenario v1, got v{} (returned {v})",
            scenario.version
        ));
    }
    if ids != ["new-1", "new-2"] {
        return Err(format!("expected [new-1, new-2], got {ids:?}"));
    }
    Ok(())
}

/// A snapshot that read the scenario's steps conflicts with a concurrent
/// step-set replacement.
async fn replace_steps_conflicts_with_step_reader<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, false).await?;

    let mut reader = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.get_scenario_for_update(&mut reader, "sc-1")
        .await
        .map_err(|e| e.to_string())?;
    s.list_steps_for_update(&mut reader, "sc-1")
        .await
        .map_err(|e| e.to_string())?;
    s.update_step_execution(&mut reader, "st-1", 0, StepStatus::Blocked, None)
        .await
        .map_err(|e| e.to_string())?;

    let mut replacer = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.replace_steps(&mut replacer, "sc-1", 0, vec![make_step("new-1", "sc-1", 1)])
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(replacer)
        .await
        .map_err(|e| e.to_string())?;

    match s.commit_snapshot(reader).await {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        Err(e) => Err(format!("expected ConcurrentConflict, got {e}")),
        Ok(()) => Err("update of a replaced step committed".to_string()),
    }
}
