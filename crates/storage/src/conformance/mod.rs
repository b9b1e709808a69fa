//! Conformance test suite for `TestdeckStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `TestdeckStorage` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Initialization**: inserts, duplicate detection, parent references
//! - **Snapshot isolation**: uncommitted writes invisible, committed writes visible
//! - **Atomic commit**: all-or-nothing semantics for multi-record snapshots
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Ordering**: steps by ordinal, bugs and history by insertion
//! - **History**: append-only audit entries
//! - **Error handling**: correct error variants for invalid operations
//! - **Concurrency**: racing snapshots resolve to exactly one winner
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use testdeck_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod error;
mod history;
mod init;
mod ordering;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use testdeck_core::{BugStatus, PackageStatus, ScenarioStatus, Severity, StepStatus};

use crate::record::{
    BugRecord, HistoryRecord, PackageRecord, ProjectRecord, ScenarioRecord, StepRecord,
};
use crate::TestdeckStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "commit").
    pub category: String,
    /// Test name (e.g. "insert_scenario_starts_at_version_0").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: TestdeckStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(ordering::run_ordering_tests(&factory).await);
    results.extend(history::run_history_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

const PROJECT_ID: &str = "proj-1";

fn make_project() -> ProjectRecord {
    ProjectRecord {
        id: PROJECT_ID.to_string(),
        name: "Conformance project".to_string(),
    }
}

fn make_package(id: &str) -> PackageRecord {
    PackageRecord {
        id: id.to_string(),
        project_id: PROJECT_ID.to_string(),
        name: format!("package {id}"),
        status: PackageStatus::Created,
        version: 0,
    }
}

fn make_scenario(id: &str, package_id: Option<&str>) -> ScenarioRecord {
    ScenarioRecord {
        id: id.to_string(),
        project_id: PROJECT_ID.to_string(),
        package_id: package_id.map(str::to_string),
        title: format!("scenario {id}"),
        status: ScenarioStatus::Created,
        version: 0,
    }
}

fn make_step(id: &str, scenario_id: &str, ordinal: u32) -> StepRecord {
    StepRecord {
        id: id.to_string(),
        scenario_id: scenario_id.to_string(),
        ordinal,
        action: format!("action {ordinal}"),
        expected_result: format!("expected {ordinal}"),
        actual_result: None,
        status: StepStatus::Pending,
        version: 0,
    }
}

fn make_bug(id: &str, scenario_id: &str, created_at: &str) -> BugRecord {
    BugRecord {
        id: id.to_string(),
        scenario_id: scenario_id.to_string(),
        related_step_id: None,
        title: format!("bug {id}"),
        description: None,
        severity: Severity::Medium,
        status: BugStatus::Open,
        created_by: "user-1".to_string(),
        created_at: created_at.to_string(),
        version: 0,
    }
}

fn make_history(id: &str, scenario_id: &str, action: &str) -> HistoryRecord {
    HistoryRecord {
        id: id.to_string(),
        scenario_id: scenario_id.to_string(),
        user_id: "user-1".to_string(),
        action: action.to_string(),
        description: None,
        metadata: Some(serde_json::json!({"source": "conformance"})),
        created_at: "2025-01-01T00:00:00Z".to_string(),
    }
}

/// Commit a project with one scenario `sc-1` holding `step_count` pending
/// steps `st-1..st-N`. The scenario sits in package `pkg-1` when `packaged`.
async fn seed_scenario<S: TestdeckStorage>(
    s: &S,
    step_count: u32,
    packaged: bool,
) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.insert_project(&mut snap, make_project())
        .await
        .map_err(|e| format!("insert project: {e}"))?;
    let package_id = if packaged {
        s.insert_package(&mut snap, make_package("pkg-1"))
            .await
            .map_err(|e| format!("insert package: {e}"))?;
        Some("pkg-1")
    } else {
        None
    };
    s.insert_scenario(&mut snap, make_scenario("sc-1", package_id))
        .await
        .map_err(|e| format!("insert scenario: {e}"))?;
    for i in 1..=step_count {
        s.insert_step(&mut snap, make_step(&format!("st-{i}"), "sc-1", i))
            .await
            .map_err(|e| format!("insert step {i}: {e}"))?;
    }
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))
}
