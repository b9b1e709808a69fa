use serde::{Deserialize, Serialize};
use testdeck_core::{BugStatus, PackageStatus, ScenarioStatus, Severity, StepStatus};

/// A project; the root that packages and scenarios belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
}

/// A user who can act on scenarios. Only display fields are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// A test package grouping scenarios of one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub status: PackageStatus,
    pub version: i64,
}

/// A test scenario. `package_id` is None for scenarios filed directly
/// under the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    pub id: String,
    pub project_id: String,
    pub package_id: Option<String>,
    pub title: String,
    pub status: ScenarioStatus,
    pub version: i64,
}

/// One ordered step of a scenario. `ordinal` is 1-based and contiguous
/// within the scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: String,
    pub scenario_id: String,
    pub ordinal: u32,
    pub action: String,
    pub expected_result: String,
    pub actual_result: Option<String>,
    pub status: StepStatus,
    pub version: i64,
}

/// A bug logged against a scenario, optionally pointing at one of its steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugRecord {
    pub id: String,
    pub scenario_id: String,
    pub related_step_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
    pub status: BugStatus,
    pub created_by: String,
    /// RFC 3339 timestamp string.
    pub created_at: String,
    pub version: i64,
}

/// An append-only audit entry for a scenario.
///
/// `metadata` is an opaque structured payload; storage never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub scenario_id: String,
    pub user_id: String,
    pub action: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}
