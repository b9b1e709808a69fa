//! Scenario and package aggregates.
//!
//! The public readers see committed state only. The `load_*` variants read
//! inside an open snapshot, so every row they return joins the snapshot's
//! read set and the snapshot's own pending writes are visible.

use serde::Serialize;
use testdeck_storage::{PackageRecord, ScenarioRecord, StepRecord, TestdeckStorage};

use crate::error::EngineError;

/// A scenario together with its steps, ordinal ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioAggregate {
    #[serde(flatten)]
    pub scenario: ScenarioRecord,
    pub steps: Vec<StepRecord>,
}

/// A package together with each of its scenarios and their steps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageAggregate {
    #[serde(flatten)]
    pub package: PackageRecord,
    pub scenarios: Vec<ScenarioAggregate>,
}

pub async fn read_scenario<S: TestdeckStorage>(
    storage: &S,
    scenario_id: &str,
) -> Result<ScenarioAggregate, EngineError> {
    let scenario = storage.get_scenario(scenario_id).await?;
    let steps = storage.list_steps(scenario_id).await?;
    Ok(ScenarioAggregate { scenario, steps })
}

pub async fn read_package<S: TestdeckStorage>(
    storage: &S,
    package_id: &str,
) -> Result<PackageAggregate, EngineError> {
    let package = storage.get_package(package_id).await?;
    let mut scenarios = Vec::new();
    for scenario in storage.list_package_scenarios(package_id).await? {
        let steps = storage.list_steps(&scenario.id).await?;
        scenarios.push(ScenarioAggregate { scenario, steps });
    }
    Ok(PackageAggregate { package, scenarios })
}

pub(crate) async fn load_scenario<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    scenario_id: &str,
) -> Result<ScenarioAggregate, EngineError> {
    let scenario = storage.get_scenario_for_update(snapshot, scenario_id).await?;
    let steps = storage.list_steps_for_update(snapshot, scenario_id).await?;
    Ok(ScenarioAggregate { scenario, steps })
}

pub(crate) async fn load_package<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    package_id: &str,
) -> Result<PackageAggregate, EngineError> {
    let package = storage.get_package_for_update(snapshot, package_id).await?;
    let members = storage
        .list_package_scenarios_for_update(snapshot, package_id)
        .await?;
    let mut scenarios = Vec::with_capacity(members.len());
    for scenario in members {
        let steps = storage.list_steps_for_update(snapshot, &scenario.id).await?;
        scenarios.push(ScenarioAggregate { scenario, steps });
    }
    Ok(PackageAggregate { package, scenarios })
}

#[cfg(test)]
mod tests {
    use super::*;
    use testdeck_core::{PackageStatus, ScenarioStatus, StepStatus};
    use testdeck_storage::{EntityKind, MemoryStorage, ProjectRecord};

    async fn seeded() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .insert_project(
                &mut snap,
                ProjectRecord {
                    id: "p".into(),
                    name: "P".into(),
                },
            )
            .await
            .unwrap();
        storage
            .insert_package(
                &mut snap,
                PackageRecord {
                    id: "pkg".into(),
                    project_id: "p".into(),
                    name: "Release".into(),
                    status: PackageStatus::Created,
                    version: 0,
                },
            )
            .await
            .unwrap();
        for sc in ["sc-b", "sc-a"] {
            storage
                .insert_scenario(
                    &mut snap,
                    ScenarioRecord {
                        id: sc.into(),
                        project_id: "p".into(),
                        package_id: Some("pkg".into()),
                        title: sc.into(),
                        status: ScenarioStatus::Created,
                        version: 0,
                    },
                )
                .await
                .unwrap();
        }
        for (id, ordinal) in [("x", 2), ("y", 1)] {
            storage
                .insert_step(
                    &mut snap,
                    StepRecord {
                        id: id.into(),
                        scenario_id: "sc-a".into(),
                        ordinal,
                        action: "do".into(),
                        expected_result: "done".into(),
                        actual_result: None,
                        status: StepStatus::Pending,
                        version: 0,
                    },
                )
                .await
                .unwrap();
        }
        storage.commit_snapshot(snap).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_scenario_steps_ordered_by_ordinal() {
        let storage = seeded().await;
        let agg = read_scenario(&storage, "sc-a").await.unwrap();
        let ids: Vec<&str> = agg.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["y", "x"]);
    }

    #[tokio::test]
    async fn test_package_holds_every_scenario() {
        let storage = seeded().await;
        let agg = read_package(&storage, "pkg").await.unwrap();
        let ids: Vec<&str> = agg.scenarios.iter().map(|s| s.scenario.id.as_str()).collect();
        assert_eq!(ids, ["sc-a", "sc-b"]);
        assert_eq!(agg.scenarios[0].steps.len(), 2);
        assert!(agg.scenarios[1].steps.is_empty());
    }

    #[tokio::test]
    async fn test_missing_roots_are_not_found() {
        let storage = seeded().await;
        assert!(matches!(
            read_scenario(&storage, "nope").await,
            Err(EngineError::NotFound { kind: EntityKind::Scenario, .. })
        ));
        assert!(matches!(
            read_package(&storage, "nope").await,
            Err(EngineError::NotFound { kind: EntityKind::Package, .. })
        ));
    }

    #[tokio::test]
    async fn test_aggregate_json_is_flat() {
        let storage = seeded().await;
        let agg = read_scenario(&storage, "sc-a").await.unwrap();
        let json = serde_json::to_value(&agg).unwrap();
        assert_eq!(json["id"], "sc-a");
        assert_eq!(json["status"], "CREATED");
        assert_eq!(json["steps"][0]["ordinal"], 1);
    }
}
