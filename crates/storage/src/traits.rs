use async_trait::async_trait;
use testdeck_core::{BugStatus, PackageStatus, ScenarioStatus, StepStatus};

use crate::error::StorageError;
use crate::record::{
    BugRecord, HistoryRecord, PackageRecord, ProjectRecord, ScenarioRecord, StepRecord, UserRecord,
};

/// The storage trait for testdeck backends.
///
/// A `TestdeckStorage` implementation provides transactional storage for
/// projects, users, packages, scenarios, steps, bugs and history entries.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()`: start a transaction, returns a `Snapshot`
/// 2. Call `*_for_update` reads and mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: commit and consume the transaction
///    OR `abort_snapshot(snapshot)`: roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, nothing it staged is
/// applied.
///
/// ## OCC Conflict Detection
///
/// Every `update_*` call takes the version the caller read and fails with
/// `StorageError::ConcurrentConflict` when the row has moved on. At commit
/// time every row the snapshot read or wrote is re-checked against the
/// committed store; if another snapshot committed a change to any of them
/// first, the commit fails with `ConcurrentConflict` and nothing is applied.
///
/// ## Ordering
///
/// Step lists are ordered by ordinal ascending. Package scenario lists are
/// ordered by scenario id. History is returned in insertion order.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait TestdeckStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Inserts (within snapshot) ─────────────────────────────────────────────
    //
    // Inserted rows are stored at version 0 regardless of the version field
    // passed in. Each insert fails with `AlreadyExists` on a duplicate id and
    // with `NotFound` when a referenced parent row is missing.

    async fn insert_project(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ProjectRecord,
    ) -> Result<(), StorageError>;

    async fn insert_user(
        &self,
        snapshot: &mut Self::Snapshot,
        record: UserRecord,
    ) -> Result<(), StorageError>;

    /// FK: `project_id`.
    async fn insert_package(
        &self,
        snapshot: &mut Self::Snapshot,
        record: PackageRecord,
    ) -> Result<(), StorageError>;

    /// FK: `project_id`, and `package_id` when present.
    async fn insert_scenario(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ScenarioRecord,
    ) -> Result<(), StorageError>;

    /// FK: `scenario_id`.
    async fn insert_step(
        &self,
        snapshot: &mut Self::Snapshot,
        record: StepRecord,
    ) -> Result<(), StorageError>;

    /// FK: `scenario_id`, and `related_step_id` when present.
    async fn insert_bug(
        &self,
        snapshot: &mut Self::Snapshot,
        record: BugRecord,
    ) -> Result<(), StorageError>;

    /// Append a history entry. There is no update or delete counterpart.
    ///
    /// FK: `scenario_id`.
    async fn insert_history(
        &self,
        snapshot: &mut Self::Snapshot,
        record: HistoryRecord,
    ) -> Result<(), StorageError>;

    // ── Reads for update (within snapshot) ────────────────────────────────────
    //
    // Rows returned here join the snapshot's read set and are re-validated at
    // commit. Reads see the snapshot's own staged writes.

    async fn get_step_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        step_id: &str,
    ) -> Result<StepRecord, StorageError>;

    async fn get_scenario_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        scenario_id: &str,
    ) -> Result<ScenarioRecord, StorageError>;

    /// All steps of a scenario, ordinal ascending. Empty if the scenario has
    /// none; does not check that the scenario exists.
    async fn list_steps_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        scenario_id: &str,
    ) -> Result<Vec<StepRecord>, StorageError>;

    async fn get_package_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        package_id: &str,
    ) -> Result<PackageRecord, StorageError>;

    /// All scenarios of a package, id ascending.
    async fn list_package_scenarios_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        package_id: &str,
    ) -> Result<Vec<ScenarioRecord>, StorageError>;

    async fn get_bug_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        bug_id: &str,
    ) -> Result<BugRecord, StorageError>;

    // ── Versioned updates (within snapshot) ───────────────────────────────────
    //
    // Each update is conditional on `version = expected_version` and returns
    // the new version number.

    /// Set a step's outcome and actual result. `actual_result` is written
    /// as given, including `None`.
    async fn update_step_execution(
        &self,
        snapshot: &mut Self::Snapshot,
        step_id: &str,
        expected_version: i64,
        status: StepStatus,
        actual_result: Option<String>,
    ) -> Result<i64, StorageError>;

    async fn update_scenario_status(
        &self,
        snapshot: &mut Self::Snapshot,
        scenario_id: &str,
        expected_version: i64,
        status: ScenarioStatus,
    ) -> Result<i64, StorageError>;

    async fn update_package_status(
        &self,
        snapshot: &mut Self::Snapshot,
        package_id: &str,
        expected_version: i64,
        status: PackageStatus,
    ) -> Result<i64, StorageError>;

    async fn update_bug_status(
        &self,
        snapshot: &mut Self::Snapshot,
        bug_id: &str,
        expected_version: i64,
        status: BugStatus,
    ) -> Result<i64, StorageError>;

    /// Replace a scenario's whole step set with `steps`.
    ///
    /// Conditional on the scenario's version; bumps it so that any other
    /// snapshot that read this scenario conflicts. Returns the new scenario
    /// version. Every step must carry this `scenario_id`.
    async fn replace_steps(
        &self,
        snapshot: &mut Self::Snapshot,
        scenario_id: &str,
        expected_scenario_version: i64,
        steps: Vec<StepRecord>,
    ) -> Result<i64, StorageError>;

    // ── Query operations (committed state only) ───────────────────────────────

    async fn get_project(&self, project_id: &str) -> Result<ProjectRecord, StorageError>;

    async fn get_user(&self, user_id: &str) -> Result<UserRecord, StorageError>;

    async fn get_package(&self, package_id: &str) -> Result<PackageRecord, StorageError>;

    async fn list_package_scenarios(
        &self,
        package_id: &str,
    ) -> Result<Vec<ScenarioRecord>, StorageError>;

    async fn get_scenario(&self, scenario_id: &str) -> Result<ScenarioRecord, StorageError>;

    async fn get_step(&self, step_id: &str) -> Result<StepRecord, StorageError>;

    /// Steps of a scenario, ordinal ascending.
    async fn list_steps(&self, scenario_id: &str) -> Result<Vec<StepRecord>, StorageError>;

    async fn get_bug(&self, bug_id: &str) -> Result<BugRecord, StorageError>;

    /// Bugs of a scenario in insertion order.
    async fn list_bugs(&self, scenario_id: &str) -> Result<Vec<BugRecord>, StorageError>;

    /// History of a scenario in insertion order.
    async fn list_history(&self, scenario_id: &str) -> Result<Vec<HistoryRecord>, StorageError>;
}
