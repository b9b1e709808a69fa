//! Scenario audit history.
//!
//! Entries are append-only. The engine writes its own entries inside the
//! snapshot of the operation that caused them, so a rolled-back operation
//! leaves no trace in the history.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use testdeck_storage::{HistoryRecord, StorageError, TestdeckStorage, UserRecord};

use crate::error::EngineError;
use crate::ids::{new_id, now_rfc3339};
use crate::snapshot::{abort, commit};

/// Action tags the engine itself records.
pub mod action {
    pub const BUG_CREATED: &str = "BUG_CREATED";
    pub const BUG_STATUS_CHANGED: &str = "BUG_STATUS_CHANGED";
    pub const SCENARIO_BLOCKED: &str = "SCENARIO_BLOCKED";
    pub const SCENARIO_UNBLOCKED: &str = "SCENARIO_UNBLOCKED";
    pub const STEPS_REPLACED: &str = "STEPS_REPLACED";
}

/// Input for a new history entry. `action` is free-form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHistoryEntry {
    pub scenario_id: String,
    pub user_id: String,
    pub action: String,
    pub description: Option<String>,
    pub metadata: Option<Value>,
}

/// A stored history entry with the acting user's display fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: HistoryRecord,
    pub user_name: Option<String>,
    pub user_email: Option<String>,
}

impl HistoryEntry {
    fn new(record: HistoryRecord, user: Option<&UserRecord>) -> Self {
        Self {
            record,
            user_name: user.map(|u| u.name.clone()),
            user_email: user.map(|u| u.email.clone()),
        }
    }
}

/// Append a history entry in its own snapshot.
pub async fn record_history<S: TestdeckStorage>(
    storage: &S,
    entry: NewHistoryEntry,
) -> Result<HistoryEntry, EngineError> {
    if entry.action.trim().is_empty() {
        return Err(EngineError::validation("history action must not be blank"));
    }

    let mut snapshot = storage.begin_snapshot().await?;
    let record = match append_history(storage, &mut snapshot, entry).await {
        Ok(record) => record,
        Err(e) => {
            abort(storage, snapshot, "record_history", &e).await;
            return Err(e);
        }
    };
    commit(storage, snapshot, "record_history").await?;

    let user = find_user(storage, &record.user_id).await?;
    Ok(HistoryEntry::new(record, user.as_ref()))
}

/// Append a history entry inside an open snapshot.
pub(crate) async fn append_history<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    entry: NewHistoryEntry,
) -> Result<HistoryRecord, EngineError> {
    let record = HistoryRecord {
        id: new_id("hist"),
        scenario_id: entry.scenario_id,
        user_id: entry.user_id,
        action: entry.action,
        description: entry.description,
        metadata: entry.metadata,
        created_at: now_rfc3339(),
    };
    storage.insert_history(snapshot, record.clone()).await?;
    tracing::debug!(
        scenario_id = %record.scenario_id,
        action = %record.action,
        "history entry appended"
    );
    Ok(record)
}

/// All history of a scenario, oldest first.
pub async fn list_history<S: TestdeckStorage>(
    storage: &S,
    scenario_id: &str,
) -> Result<Vec<HistoryEntry>, EngineError> {
    storage.get_scenario(scenario_id).await?;
    let records = storage.list_history(scenario_id).await?;

    let mut users: BTreeMap<String, Option<UserRecord>> = BTreeMap::new();
    let mut entries = Vec::with_capacity(records.len());
    for record in records {
        if !users.contains_key(&record.user_id) {
            let user = find_user(storage, &record.user_id).await?;
            users.insert(record.user_id.clone(), user);
        }
        let user = users.get(&record.user_id).and_then(Option::as_ref);
        entries.push(HistoryEntry::new(record, user));
    }
    Ok(entries)
}

async fn find_user<S: TestdeckStorage>(
    storage: &S,
    user_id: &str,
) -> Result<Option<UserRecord>, EngineError> {
    match storage.get_user(user_id).await {
        Ok(user) => Ok(Some(user)),
        Err(StorageError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testdeck_storage::{EntityKind, MemoryStorage, ProjectRecord, ScenarioRecord};

    async fn storage_with_scenario() -> MemoryStorage {
        let storage = MemoryStorage::new();
        let mut snap = storage.begin_snapshot().await.unwrap();
        storage
            .insert_project(
                &mut snap,
                ProjectRecord {
                    id: "p".into(),
                    name: "Project".into(),
                },
            )
            .await
            .unwrap();
        storage
            .insert_user(
                &mut snap,
                UserRecord {
                    id: "ana".into(),
                    name: "Ana Tester".into(),
                    email: "ana@example.com".into(),
                },
            )
            .await
            .unwrap();
        storage
            .insert_scenario(
                &mut snap,
                ScenarioRecord {
                    id: "sc".into(),
                    project_id: "p".into(),
                    package_id: None,
                    title: "Login".into(),
                    status: Default::default(),
                    version: 0,
                },
            )
            .await
            .unwrap();
        storage.commit_snapshot(snap).await.unwrap();
        storage
    }

    fn entry(user_id: &str, action: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            scenario_id: "sc".into(),
            user_id: user_id.into(),
            action: action.into(),
            description: Some("manual note".into()),
            metadata: Some(serde_json::json!({"k": 1})),
        }
    }

    #[tokio::test]
    async fn test_record_denormalizes_known_user() {
        let storage = storage_with_scenario().await;
        let stored = record_history(&storage, entry("ana", "COMMENT")).await.unwrap();
        assert_eq!(stored.user_name.as_deref(), Some("Ana Tester"));
        assert_eq!(stored.user_email.as_deref(), Some("ana@example.com"));
        assert_eq!(stored.record.metadata, Some(serde_json::json!({"k": 1})));
    }

    #[tokio::test]
    async fn test_unknown_user_leaves_display_fields_empty() {
        let storage = storage_with_scenario().await;
        let stored = record_history(&storage, entry("ghost", "COMMENT"))
            .await
            .unwrap();
        assert_eq!(stored.user_name, None);
        assert_eq!(stored.user_email, None);
    }

    #[tokio::test]
    async fn test_blank_action_rejected() {
        let storage = storage_with_scenario().await;
        let err = record_history(&storage, entry("ana", "  ")).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(storage.list_history("sc").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_scenario_is_not_found() {
        let storage = storage_with_scenario().await;
        let mut e = entry("ana", "COMMENT");
        e.scenario_id = "nope".into();
        let err = record_history(&storage, e).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::NotFound {
                kind: EntityKind::Scenario,
                ..
            }
        ));
        let err = list_history(&storage, "nope").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_is_in_creation_order() {
        let storage = storage_with_scenario().await;
        for action in ["ONE", "TWO", "THREE"] {
            record_history(&storage, entry("ana", action)).await.unwrap();
        }
        let listed = list_history(&storage, "sc").await.unwrap();
        let actions: Vec<&str> = listed.iter().map(|e| e.record.action.as_str()).collect();
        assert_eq!(actions, ["ONE", "TWO", "THREE"]);
    }

    #[tokio::test]
    async fn test_entry_serializes_flat_camel_case() {
        let storage = storage_with_scenario().await;
        let stored = record_history(&storage, entry("ana", "COMMENT")).await.unwrap();
        let json = serde_json::to_value(&stored).unwrap();
        assert_eq!(json["scenarioId"], "sc");
        assert_eq!(json["action"], "COMMENT");
        assert_eq!(json["userName"], "Ana Tester");
        assert!(json.get("record").is_none());
    }
}
