use std::future::Future;

use super::{make_package, make_project, make_scenario, make_step, seed_scenario, TestResult};
use crate::{EntityKind, StorageError, TestdeckStorage};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "insert_scenario_starts_at_version_0",
        insert_scenario_starts_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "insert_ignores_caller_version",
        insert_ignores_caller_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "duplicate_scenario_returns_already_exists",
        duplicate_scenario_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "duplicate_in_same_snapshot_returns_already_exists",
        duplicate_in_same_snapshot_returns_already_exists(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "step_requires_existing_scenario",
        step_requires_existing_scenario(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "scenario_requires_existing_package",
        scenario_requires_existing_package(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "package_scenarios_listed",
        package_scenarios_listed(factory).await,
    ));

    results
}

/// After insert + commit, the scenario version must be 0.
async fn insert_scenario_starts_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let rec = s.get_scenario("sc-1").await.map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    Ok(())
}

/// The version field passed to an insert is not trusted.
async fn insert_ignores_caller_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut step = make_step("st-1", "sc-1", 1);
    step.version = 42;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_step(&mut snap, step)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s.get_step("st-1").await.map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    Ok(())
}

/// Inserting a scenario id that is already committed fails with AlreadyExists.
async fn duplicate_scenario_returns_already_exists<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s.insert_scenario(&mut snap, make_scenario("sc-1", None)).await {
        Err(StorageError::AlreadyExists {
            kind: EntityKind::Scenario,
            id,
        }) if id == "sc-1" => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists(scenario sc-1), got {e}")),
        Ok(()) => Err("expected AlreadyExists, got Ok".to_string()),
    }
}

/// A second insert of the same id inside one snapshot also fails.
async fn duplicate_in_same_snapshot_returns_already_exists<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_project(&mut snap, make_project())
        .await
        .map_err(|e| e.to_string())?;
    match s.insert_project(&mut snap, make_project()).await {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(e) => Err(format!("expected AlreadyExists, got {e}")),
        Ok(()) => Err("expected AlreadyExists, got Ok".to_string()),
    }
}

/// Inserting a step for an unknown scenario fails with NotFound(scenario).
async fn step_requires_existing_scenario<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    match s.insert_step(&mut snap, make_step("st-1", "ghost", 1)).await {
        Err(StorageError::NotFound {
            kind: EntityKind::Scenario,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected NotFound(scenario), got {e}")),
        Ok(()) => Err("expected NotFound, got Ok".to_string()),
    }
}

/// A scenario that names a package needs that package to exist.
async fn scenario_requires_existing_package<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_project(&mut snap, make_project())
        .await
        .map_err(|e| e.to_string())?;
    match s
        .insert_scenario(&mut snap, make_scenario("sc-1", Some("ghost")))
        .await
    {
        Err(StorageError::NotFound {
            kind: EntityKind::Package,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected NotFound(package), got {e}")),
        Ok(()) => Err("expected NotFound, got Ok".to_string()),
    }
}

/// Scenarios inserted under a package are listed for it, and only for it.
async fn package_scenarios_listed<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 1, true).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_package(&mut snap, make_package("pkg-2"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_scenario(&mut snap, make_scenario("sc-0", Some("pkg-1")))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_scenario(&mut snap, make_scenario("sc-x", Some("pkg-2")))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let listed = s
        .list_package_scenarios("pkg-1")
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
    if ids != ["sc-0", "sc-1"] {
        return Err(format!("expected [sc-0, sc-1], got {ids:?}"));
    }
    Ok(())
}
