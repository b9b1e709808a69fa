use std::future::Future;

use super::{make_bug, make_history, make_step, seed_scenario, TestResult};
use crate::TestdeckStorage;

pub(super) async fn run_ordering_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "ordering",
        "steps_listed_by_ordinal_not_insertion",
        steps_listed_by_ordinal_not_insertion(factory).await,
    ));
    results.push(TestResult::from_result(
        "ordering",
        "steps_for_update_listed_by_ordinal",
        steps_for_update_listed_by_ordinal(factory).await,
    ));
    results.push(TestResult::from_result(
        "ordering",
        "history_listed_in_insertion_order",
        history_listed_in_insertion_order(factory).await,
    ));
    results.push(TestResult::from_result(
        "ordering",
        "bugs_listed_in_insertion_order",
        bugs_listed_in_insertion_order(factory).await,
    ));

    results
}

async fn steps_listed_by_ordinal_not_insertion<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    // Ids sort the opposite way to ordinals.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for (id, ordinal) in [("c", 1), ("b", 3), ("a", 2)] {
        s.insert_step(&mut snap, make_step(id, "sc-1", ordinal))
            .await
            .map_err(|e| e.to_string())?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let steps = s.list_steps("sc-1").await.map_err(|e| e.to_string())?;
    let ordinals: Vec<u32> = steps.iter().map(|st| st.ordinal).collect();
    if ordinals != [1, 2, 3] {
        return Err(format!("expected ordinals [1, 2, 3], got {ordinals:?}"));
    }
    Ok(())
}

async fn steps_for_update_listed_by_ordinal<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    for (id, ordinal) in [("z", 2), ("y", 1)] {
        s.insert_step(&mut snap, make_step(id, "sc-1", ordinal))
            .await
            .map_err(|e| e.to_string())?;
    }
    let steps = s
        .list_steps_for_update(&mut snap, "sc-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let ids: Vec<&str> = steps.iter().map(|st| st.id.as_str()).collect();
    if ids != ["y", "z"] {
        return Err(format!("expected [y, z], got {ids:?}"));
    }
    Ok(())
}

async fn history_listed_in_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    for (id, action) in [("h-z", "FIRST"), ("h-a", "SECOND"), ("h-m", "THIRD")] {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.insert_history(&mut snap, make_history(id, "sc-1", action))
            .await
            .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    }

    let history = s.list_history("sc-1").await.map_err(|e| e.to_string())?;
    let actions: Vec<&str> = history.iter().map(|h| h.action.as_str()).collect();
    if actions != ["FIRST", "SECOND", "THIRD"] {
        return Err(format!("unexpected history order: {actions:?}"));
    }
    Ok(())
}

/// Timestamps with trimmed fractions sort backwards as text ("05.5Z" < "05Z"),
/// and ids here sort backwards too, so only insertion order gives the
/// expected listing.
async fn bugs_listed_in_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed_scenario(&s, 0, false).await?;

    for (id, created_at) in [
        ("bug-z", "2025-01-01T00:00:05Z"),
        ("bug-m", "2025-01-01T00:00:05.12Z"),
        ("bug-a", "2025-01-01T00:00:05.5Z"),
    ] {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.insert_bug(&mut snap, make_bug(id, "sc-1", created_at))
            .await
            .map_err(|e| e.to_string())?;
        s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;
    }

    let bugs = s.list_bugs("sc-1").await.map_err(|e| e.to_string())?;
    let ids: Vec<&str> = bugs.iter().map(|b| b.id.as_str()).collect();
    if ids != ["bug-z", "bug-m", "bug-a"] {
        return Err(format!("unexpected bug order: {ids:?}"));
    }
    Ok(())
}
