//! History conformance tests.
//!
//! History entries are append-only and carry their structured payload
//! through storage untouched.

use std::future::Future;

use super::{make_history, seed_scenario, TestResult};
use crate::{EntityKind, StorageError, TestdeckStorage};

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "history",
        "history_requires_existing_scenario",
        history_requires_existing_scenario(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "history_metadata_preserved",
        history_metadata_preserved(factory).await,
    ));
    results.push(TestResult::from_result(
        "history",
        "history_scoped_to_scenario",
        history_scoped_to_scenario(factory).await,
    ));

    results
}

async fn history_requires_existing_scenario<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .insert_history(&mut snap, make_history("h-1", "ghost", "NOTE"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotFound {
            kind: EntityKind::Scenario,
            ..
        }) => Ok(()),
        Err(e) => Err(format!("expected NotFound(scenario), got {e}")),
        Ok(()) => Err("history accepted for unknown scenario".to_string()),
    }
}

async fn history_metadata_preserved<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let payload = serde_json::json!({
        "bugId": "bug-1",
        "nested": {"list": [1, 2, 3], "flag": true},
    });
    let mut entry = make_history("h-1", "sc-1", "BUG_CREATED");
    entry.description = Some("Bug raised".to_string());
    entry.metadata = Some(payload.clone());

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_history(&mut snap, entry)
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let history = s.list_history("sc-1").await.map_err(|e| e.to_string())?;
    let stored = history
        .first()
        .ok_or_else(|| "history entry missing".to_string())?;
    if stored.metadata.as_ref() != Some(&payload) {
        return Err(format!("metadata changed: {:?}", stored.metadata));
    }
    if stored.description.as_deref() != Some("Bug raised") {
        return Err(format!("description changed: {:?}", stored.description));
    }
    Ok(())
}

async fn history_scoped_to_scenario<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_scenario(&mut snap, super::make_scenario("sc-2", None))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_history(&mut snap, make_history("h-1", "sc-1", "ONE"))
        .await
        .map_err(|e| e.to_string())?;
    s.insert_history(&mut snap, make_history("h-2", "sc-2", "TWO"))
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let history = s.list_history("sc-2").await.map_err(|e| e.to_string())?;
    if history.len() != 1 || history[0].action != "TWO" {
        return Err(format!("expected only TWO for sc-2, got {history:?}"));
    }
    Ok(())
}
