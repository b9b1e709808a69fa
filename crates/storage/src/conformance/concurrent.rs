use std::future::Future;
use std::sync::Arc;

use testdeck_core::{ScenarioStatus, StepStatus};

use super::{make_step, seed_scenario, TestResult};
use crate::{StorageError, TestdeckStorage};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_exactly_one_wins",
        concurrent_updates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_step_inserts_exactly_one_wins",
        concurrent_step_inserts_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_steps_all_succeed",
        concurrent_updates_different_steps_all_succeed(factory).await,
    ));

    results
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each open a snapshot and attempt to update the same scenario from
/// version 0. Exactly one commit succeeds; the rest must get ConcurrentConflict,
/// either from the update itself or from the commit.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_scenario(storage.as_ref(), 0, false).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let updated = s
                .update_scenario_status(&mut snap, "sc-1", 0, ScenarioStatus::Blocked)
                .await;
            let outcome = match updated {
                Ok(_) => s.commit_snapshot(snap).await,
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            };
            match outcome {
                Ok(()) => Ok(true),
                Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let rec = storage
        .get_scenario("sc-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.version != 1 {
        return Err(format!("expected version 1, got {}", rec.version));
    }
    Ok(())
}

// ── Concurrent insert: exactly one wins ─────────────────────────────────────

/// N tasks each insert the same step id. Exactly one lands; the rest fail
/// with AlreadyExists or ConcurrentConflict.
async fn concurrent_step_inserts_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_scenario(storage.as_ref(), 0, false).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let inserted = s.insert_step(&mut snap, make_step("st-1", "sc-1", 1)).await;
            let outcome = match inserted {
                Ok(()) => s.commit_snapshot(snap).await,
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            };
            match outcome {
                Ok(()) => Ok(true),
                Err(StorageError::AlreadyExists { .. })
                | Err(StorageError::ConcurrentConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    let steps = storage
        .list_steps("sc-1")
        .await
        .map_err(|e| e.to_string())?;
    if steps.len() != 1 {
        return Err(format!("expected 1 step, got {}", steps.len()));
    }
    Ok(())
}

// ── Independent rows: no false conflicts ────────────────────────────────────

/// N tasks each update a different step without reading siblings. All must
/// succeed.
async fn concurrent_updates_different_steps_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed_scenario(storage.as_ref(), N as u32, false).await?;

    let mut handles = Vec::new();
    for i in 1..=N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            s.update_step_execution(
                &mut snap,
                &format!("st-{i}"),
                0,
                StepStatus::Passed,
                None,
            )
            .await?;
            s.commit_snapshot(snap).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let steps = storage
        .list_steps("sc-1")
        .await
        .map_err(|e| e.to_string())?;
    if steps.iter().any(|st| st.status != StepStatus::Passed) {
        return Err("not every step update landed".to_string());
    }
    Ok(())
}
