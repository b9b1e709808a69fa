use std::future::Future;

use testdeck_core::{PackageStatus, ScenarioStatus, StepStatus};

use super::{seed_scenario, TestResult};
use crate::{EntityKind, StorageError, TestdeckStorage};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_scenario_nonexistent",
        get_scenario_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_step_not_found_has_correct_fields",
        get_step_not_found_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_scenario_for_update_nonexistent",
        get_scenario_for_update_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_step_nonexistent",
        update_step_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_package_nonexistent",
        update_package_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_bug_nonexistent",
        get_bug_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_steps_empty_for_nonexistent",
        list_steps_empty_for_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_history_empty_for_nonexistent",
        list_history_empty_for_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "failed_update_leaves_row_untouched",
        failed_update_leaves_row_untouched(factory).await,
    ));

    results
}

async fn get_scenario_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_scenario("ghost").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(_) => Err("expected NotFound, got Ok".to_string()),
    }
}

async fn get_step_not_found_has_correct_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_step("st-404").await {
        Err(StorageError::NotFound { kind, id }) => {
            if kind != EntityKind::Step {
                return Err(format!("expected kind step, got {kind}"));
            }
            if id != "st-404" {
                return Err(format!("expected id st-404, got {id}"));
            }
            Ok(())
        }
        Err(e) => Err(format!("expected NotFound, got {e}")),
        Ok(_) => Err("expected NotFound, got Ok".to_string()),
    }
}

async fn get_scenario_for_update_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s.get_scenario_for_update(&mut snap, "ghost").await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotFound {
            kind: EntityKind::Scenario,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected NotFound(scenario), got {e}")),
        Ok(_) => Err("expected NotFound, got Ok".to_string()),
    }
}

async fn update_step_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_step_execution(&mut snap, "ghost", 0, StepStatus::Passed, None)
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotFound {
            kind: EntityKind::Step,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected NotFound(step), got {e}")),
        Ok(_) => Err("expected NotFound, got Ok".to_string()),
    }
}

async fn update_package_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_package_status(&mut snap, "ghost", 0, PackageStatus::Blocked)
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotFound {
            kind: EntityKind::Package,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected NotFound(package), got {e}")),
        Ok(_) => Err("expected NotFound, got Ok".to_string()),
    }
}

async fn get_bug_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_bug("ghost").await {
        Err(StorageError::NotFound {
            kind: EntityKind::Bug,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected NotFound(bug), got {e}")),
        Ok(_) => Err("expected NotFound, got Ok".to_string()),
    }
}

async fn list_steps_empty_for_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let steps = s.list_steps("ghost").await.map_err(|e| e.to_string())?;
    if !steps.is_empty() {
        return Err(format!("expected no steps, got {}", steps.len()));
    }
    Ok(())
}

async fn list_history_empty_for_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let history = s.list_history("ghost").await.map_err(|e| e.to_string())?;
    if !history.is_empty() {
        return Err(format!("expected no history, got {}", history.len()));
    }
    Ok(())
}

/// A rejected update (wrong version) does not change the row, even after
/// the snapshot commits.
async fn failed_update_leaves_row_untouched<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_scenario_status(&mut snap, "sc-1", 5, ScenarioStatus::Blocked)
        .await;
    if !matches!(result, Err(StorageError::ConcurrentConflict { .. })) {
        return Err(format!("expected ConcurrentConflict, got {result:?}"));
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;
    if rec.status != ScenarioStatus::Created || rec.version != 0 {
        return Err(format!(
            "expected CREATED at v0, got {} at v{}",
            rec.status, rec.version
        ));
    }
    Ok(())
}
