//! In-memory `TestdeckStorage` backend.
//!
//! Committed rows live in one mutex-guarded set of tables. A snapshot keeps
//! its own overlay of pending writes plus the version of every row it has
//! touched; commit re-checks those versions under the lock and applies the
//! overlay only if none of them moved (first committer wins).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use testdeck_core::{BugStatus, PackageStatus, ScenarioStatus, StepStatus};

use crate::error::{EntityKind, StorageError};
use crate::record::{
    BugRecord, HistoryRecord, PackageRecord, ProjectRecord, ScenarioRecord, StepRecord, UserRecord,
};
use crate::traits::TestdeckStorage;

/// A row type held in a versioned table.
trait Row: Clone {
    const KIND: EntityKind;
    fn id(&self) -> &str;
    fn version(&self) -> i64;
}

macro_rules! versioned_row {
    ($ty:ty, $kind:expr) => {
        impl Row for $ty {
            const KIND: EntityKind = $kind;
            fn id(&self) -> &str {
                &self.id
            }
            fn version(&self) -> i64 {
                self.version
            }
        }
    };
}

versioned_row!(PackageRecord, EntityKind::Package);
versioned_row!(ScenarioRecord, EntityKind::Scenario);
versioned_row!(StepRecord, EntityKind::Step);
versioned_row!(BugRecord, EntityKind::Bug);

// Projects and users are never updated, so their version is fixed.
impl Row for ProjectRecord {
    const KIND: EntityKind = EntityKind::Project;
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> i64 {
        0
    }
}

impl Row for UserRecord {
    const KIND: EntityKind = EntityKind::User;
    fn id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> i64 {
        0
    }
}

type Table<R> = BTreeMap<String, R>;

#[derive(Default)]
struct Tables {
    projects: Table<ProjectRecord>,
    users: Table<UserRecord>,
    packages: Table<PackageRecord>,
    scenarios: Table<ScenarioRecord>,
    steps: Table<StepRecord>,
    bugs: Table<BugRecord>,
    /// Bug ids in commit order.
    bug_order: Vec<String>,
    history: Vec<HistoryRecord>,
}

/// Per-table overlay held by a snapshot.
struct Staged<R> {
    /// Version of each touched row as first seen (None = row absent).
    seen: BTreeMap<String, Option<i64>>,
    /// Pending writes; None removes the row.
    writes: BTreeMap<String, Option<R>>,
}

impl<R> Default for Staged<R> {
    fn default() -> Self {
        Self {
            seen: BTreeMap::new(),
            writes: BTreeMap::new(),
        }
    }
}

impl<R: Row> Staged<R> {
    fn remember(&mut self, committed: &Table<R>, id: &str) {
        if !self.seen.contains_key(id) {
            let version = committed.get(id).map(Row::version);
            self.seen.insert(id.to_string(), version);
        }
    }

    fn get(&mut self, committed: &Table<R>, id: &str) -> Option<R> {
        if let Some(pending) = self.writes.get(id) {
            return pending.clone();
        }
        self.remember(committed, id);
        committed.get(id).cloned()
    }

    fn require(&mut self, committed: &Table<R>, id: &str) -> Result<R, StorageError> {
        self.get(committed, id)
            .ok_or_else(|| StorageError::not_found(R::KIND, id))
    }

    fn put(&mut self, committed: &Table<R>, row: R) {
        let id = row.id().to_string();
        self.remember(committed, &id);
        self.writes.insert(id, Some(row));
    }

    fn remove(&mut self, committed: &Table<R>, id: &str) {
        self.remember(committed, id);
        self.writes.insert(id.to_string(), None);
    }

    fn insert(&mut self, committed: &Table<R>, row: R) -> Result<(), StorageError> {
        if self.get(committed, row.id()).is_some() {
            return Err(StorageError::AlreadyExists {
                kind: R::KIND,
                id: row.id().to_string(),
            });
        }
        self.put(committed, row);
        Ok(())
    }

    fn scan<F>(&mut self, committed: &Table<R>, keep: F) -> Vec<R>
    where
        F: Fn(&R) -> bool,
    {
        let mut out = Vec::new();
        for (id, row) in committed {
            if self.writes.contains_key(id) || !keep(row) {
                continue;
            }
            self.seen
                .entry(id.clone())
                .or_insert_with(|| Some(row.version()));
            out.push(row.clone());
        }
        for row in self.writes.values().flatten() {
            if keep(row) {
                out.push(row.clone());
            }
        }
        out
    }

    fn validate(&self, committed: &Table<R>) -> Result<(), StorageError> {
        for (id, seen) in &self.seen {
            let current = committed.get(id).map(Row::version);
            if current == *seen {
                continue;
            }
            if seen.is_none() && matches!(self.writes.get(id), Some(Some(_))) {
                return Err(StorageError::AlreadyExists {
                    kind: R::KIND,
                    id: id.clone(),
                });
            }
            return Err(StorageError::ConcurrentConflict {
                kind: R::KIND,
                id: id.clone(),
                expected_version: seen.unwrap_or(-1),
            });
        }
        Ok(())
    }

    fn apply(self, committed: &mut Table<R>) {
        for (id, pending) in self.writes {
            match pending {
                Some(row) => {
                    committed.insert(id, row);
                }
                None => {
                    committed.remove(&id);
                }
            }
        }
    }
}

/// Snapshot type for [`MemoryStorage`].
pub struct MemorySnapshot {
    id: u64,
    projects: Staged<ProjectRecord>,
    users: Staged<UserRecord>,
    packages: Staged<PackageRecord>,
    scenarios: Staged<ScenarioRecord>,
    steps: Staged<StepRecord>,
    bugs: Staged<BugRecord>,
    new_bugs: Vec<String>,
    history: Vec<HistoryRecord>,
}

impl MemorySnapshot {
    /// Backend-assigned sequence number, unique per storage instance.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Process-local storage backend. Data is lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
    next_snapshot: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|_| StorageError::Backend("memory storage lock poisoned".to_string()))
    }
}

fn sort_steps(steps: &mut [StepRecord]) {
    steps.sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.id.cmp(&b.id)));
}

fn sort_scenarios(scenarios: &mut [ScenarioRecord]) {
    scenarios.sort_by(|a, b| a.id.cmp(&b.id));
}

fn conflict(kind: EntityKind, id: &str, expected_version: i64) -> StorageError {
    StorageError::ConcurrentConflict {
        kind,
        id: id.to_string(),
        expected_version,
    }
}

#[async_trait]
impl TestdeckStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        Ok(MemorySnapshot {
            id: self.next_snapshot.fetch_add(1, Ordering::SeqCst),
            projects: Staged::default(),
            users: Staged::default(),
            packages: Staged::default(),
            scenarios: Staged::default(),
            steps: Staged::default(),
            bugs: Staged::default(),
            new_bugs: Vec::new(),
            history: Vec::new(),
        })
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        let mut tables = self.tables()?;

        snapshot.projects.validate(&tables.projects)?;
        snapshot.users.validate(&tables.users)?;
        snapshot.packages.validate(&tables.packages)?;
        snapshot.scenarios.validate(&tables.scenarios)?;
        snapshot.steps.validate(&tables.steps)?;
        snapshot.bugs.validate(&tables.bugs)?;

        let MemorySnapshot {
            projects,
            users,
            packages,
            scenarios,
            steps,
            bugs,
            new_bugs,
            history,
            ..
        } = snapshot;
        projects.apply(&mut tables.projects);
        users.apply(&mut tables.users);
        packages.apply(&mut tables.packages);
        scenarios.apply(&mut tables.scenarios);
        steps.apply(&mut tables.steps);
        bugs.apply(&mut tables.bugs);
        tables.bug_order.extend(new_bugs);
        tables.history.extend(history);
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn insert_project(
        &self,
        snapshot: &mut MemorySnapshot,
        record: ProjectRecord,
    ) -> Result<(), StorageError> {
        let tables = self.tables()?;
        snapshot.projects.insert(&tables.projects, record)
    }

    async fn insert_user(
        &self,
        snapshot: &mut MemorySnapshot,
        record: UserRecord,
    ) -> Result<(), StorageError> {
        let tables = self.tables()?;
        snapshot.users.insert(&tables.users, record)
    }

    async fn insert_package(
        &self,
        snapshot: &mut MemorySnapshot,
        mut record: PackageRecord,
    ) -> Result<(), StorageError> {
        let tables = self.tables()?;
        snapshot
            .projects
            .require(&tables.projects, &record.project_id)?;
        record.version = 0;
        snapshot.packages.insert(&tables.packages, record)
    }

    async fn insert_scenario(
        &self,
        snapshot: &mut MemorySnapshot,
        mut record: ScenarioRecord,
    ) -> Result<(), StorageError> {
        let tables = self.tables()?;
        snapshot
            .projects
            .require(&tables.projects, &record.project_id)?;
        if let Some(package_id) = &record.package_id {
            snapshot.packages.require(&tables.packages, package_id)?;
        }
        record.version = 0;
        snapshot.scenarios.insert(&tables.scenarios, record)
    }

    async fn insert_step(
        &self,
        snapshot: &mut MemorySnapshot,
        mut record: StepRecord,
    ) -> Result<(), StorageError> {
        let tables = self.tables()?;
        snapshot
            .scenarios
            .require(&tables.scenarios, &record.scenario_id)?;
        record.version = 0;
        snapshot.steps.insert(&tables.steps, record)
    }

    async fn insert_bug(
        &self,
        snapshot: &mut MemorySnapshot,
        mut record: BugRecord,
    ) -> Result<(), StorageError> {
        let tables = self.tables()?;
        snapshot
            .scenarios
            .require(&tables.scenarios, &record.scenario_id)?;
        if let Some(step_id) = &record.related_step_id {
            snapshot.steps.require(&tables.steps, step_id)?;
        }
        record.version = 0;
        let id = record.id.clone();
        snapshot.bugs.insert(&tables.bugs, record)?;
        snapshot.new_bugs.push(id);
        Ok(())
    }

    async fn insert_history(
        &self,
        snapshot: &mut MemorySnapshot,
        record: HistoryRecord,
    ) -> Result<(), StorageError> {
        let tables = self.tables()?;
        snapshot
            .scenarios
            .require(&tables.scenarios, &record.scenario_id)?;
        snapshot.history.push(record);
        Ok(())
    }

    async fn get_step_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        step_id: &str,
    ) -> Result<StepRecord, StorageError> {
        let tables = self.tables()?;
        snapshot.steps.require(&tables.steps, step_id)
    }

    async fn get_scenario_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        scenario_id: &str,
    ) -> Result<ScenarioRecord, StorageError> {
        let tables = self.tables()?;
        snapshot.scenarios.require(&tables.scenarios, scenario_id)
    }

    async fn list_steps_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        scenario_id: &str,
    ) -> Result<Vec<StepRecord>, StorageError> {
        let tables = self.tables()?;
        let mut steps = snapshot
            .steps
            .scan(&tables.steps, |s| s.scenario_id == scenario_id);
        sort_steps(&mut steps);
        Ok(steps)
    }

    async fn get_package_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        package_id: &str,
    ) -> Result<PackageRecord, StorageError> {
        let tables = self.tables()?;
        snapshot.packages.require(&tables.packages, package_id)
    }

    async fn list_package_scenarios_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        package_id: &str,
    ) -> Result<Vec<ScenarioRecord>, StorageError> {
        let tables = self.tables()?;
        let mut scenarios = snapshot.scenarios.scan(&tables.scenarios, |s| {
            s.package_id.as_deref() == Some(package_id)
        });
        sort_scenarios(&mut scenarios);
        Ok(scenarios)
    }

    async fn get_bug_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        bug_id: &str,
    ) -> Result<BugRecord, StorageError> {
        let tables = self.tables()?;
        snapshot.bugs.require(&tables.bugs, bug_id)
    }

    async fn update_step_execution(
        &self,
        snapshot: &mut MemorySnapshot,
        step_id: &str,
        expected_version: i64,
        status: StepStatus,
        actual_result: Option<String>,
    ) -> Result<i64, StorageError> {
        let tables = self.tables()?;
        let mut step = snapshot.steps.require(&tables.steps, step_id)?;
        if step.version != expected_version {
            return Err(conflict(EntityKind::Step, step_id, expected_version));
        }
        step.status = status;
        step.actual_result = actual_result;
        step.version += 1;
        let version = step.version;
        snapshot.steps.put(&tables.steps, step);
        Ok(version)
    }

    async fn update_scenario_status(
        &self,
        snapshot: &mut MemorySnapshot,
        scenario_id: &str,
        expected_version: i64,
        status: ScenarioStatus,
    ) -> Result<i64, StorageError> {
        let tables = self.tables()?;
        let mut scenario = snapshot.scenarios.require(&tables.scenarios, scenario_id)?;
        if scenario.version != expected_version {
            return Err(conflict(EntityKind::Scenario, scenario_id, expected_version));
        }
        scenario.status = status;
        scenario.version += 1;
        let version = scenario.version;
        snapshot.scenarios.put(&tables.scenarios, scenario);
        Ok(version)
    }

    async fn update_package_status(
        &self,
        snapshot: &mut MemorySnapshot,
        package_id: &str,
        expected_version: i64,
        status: PackageStatus,
    ) -> Result<i64, StorageError> {
        let tables = self.tables()?;
        let mut package = snapshot.packages.require(&tables.packages, package_id)?;
        if package.version != expected_version {
            return Err(conflict(EntityKind::Package, package_id, expected_version));
        }
        package.status = status;
        package.version += 1;
        let version = package.version;
        snapshot.packages.put(&tables.packages, package);
        Ok(version)
    }

    async fn update_bug_status(
        &self,
        snapshot: &mut MemorySnapshot,
        bug_id: &str,
        expected_version: i64,
        status: BugStatus,
    ) -> Result<i64, StorageError> {
        let tables = self.tables()?;
        let mut bug = snapshot.bugs.require(&tables.bugs, bug_id)?;
        if bug.version != expected_version {
            return Err(conflict(EntityKind::Bug, bug_id, expected_version));
        }
        bug.status = status;
        bug.version += 1;
        let version = bug.version;
        snapshot.bugs.put(&tables.bugs, bug);
        Ok(version)
    }

    async fn replace_steps(
        &self,
        snapshot: &mut MemorySnapshot,
        scenario_id: &str,
        expected_scenario_version: i64,
        steps: Vec<StepRecord>,
    ) -> Result<i64, StorageError> {
        let tables = self.tables()?;
        let mut scenario = snapshot.scenarios.require(&tables.scenarios, scenario_id)?;
        if scenario.version != expected_scenario_version {
            return Err(conflict(
                EntityKind::Scenario,
                scenario_id,
                expected_scenario_version,
            ));
        }
        if let Some(stray) = steps.iter().find(|s| s.scenario_id != scenario_id) {
            return Err(StorageError::Backend(format!(
                "step {} belongs to scenario {}, not {}",
                stray.id, stray.scenario_id, scenario_id
            )));
        }

        let existing = snapshot
            .steps
            .scan(&tables.steps, |s| s.scenario_id == scenario_id);
        for old in &existing {
            snapshot.steps.remove(&tables.steps, &old.id);
        }
        for mut step in steps {
            step.version = 0;
            snapshot.steps.insert(&tables.steps, step)?;
        }

        scenario.version += 1;
        let version = scenario.version;
        snapshot.scenarios.put(&tables.scenarios, scenario);
        Ok(version)
    }

    async fn get_project(&self, project_id: &str) -> Result<ProjectRecord, StorageError> {
        let tables = self.tables()?;
        tables
            .projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Project, project_id))
    }

    async fn get_user(&self, user_id: &str) -> Result<UserRecord, StorageError> {
        let tables = self.tables()?;
        tables
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::User, user_id))
    }

    async fn get_package(&self, package_id: &str) -> Result<PackageRecord, StorageError> {
        let tables = self.tables()?;
        tables
            .packages
            .get(package_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Package, package_id))
    }

    async fn list_package_scenarios(
        &self,
        package_id: &str,
    ) -> Result<Vec<ScenarioRecord>, StorageError> {
        let tables = self.tables()?;
        let mut scenarios: Vec<ScenarioRecord> = tables
            .scenarios
            .values()
            .filter(|s| s.package_id.as_deref() == Some(package_id))
            .cloned()
            .collect();
        sort_scenarios(&mut scenarios);
        Ok(scenarios)
    }

    async fn get_scenario(&self, scenario_id: &str) -> Result<ScenarioRecord, StorageError> {
        let tables = self.tables()?;
        tables
            .scenarios
            .get(scenario_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Scenario, scenario_id))
    }

    async fn get_step(&self, step_id: &str) -> Result<StepRecord, StorageError> {
        let tables = self.tables()?;
        tables
            .steps
            .get(step_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Step, step_id))
    }

    async fn list_steps(&self, scenario_id: &str) -> Result<Vec<StepRecord>, StorageError> {
        let tables = self.tables()?;
        let mut steps: Vec<StepRecord> = tables
            .steps
            .values()
            .filter(|s| s.scenario_id == scenario_id)
            .cloned()
            .collect();
        sort_steps(&mut steps);
        Ok(steps)
    }

    async fn get_bug(&self, bug_id: &str) -> Result<BugRecord, StorageError> {
        let tables = self.tables()?;
        tables
            .bugs
            .get(bug_id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(EntityKind::Bug, bug_id))
    }

    async fn list_bugs(&self, scenario_id: &str) -> Result<Vec<BugRecord>, StorageError> {
        let tables = self.tables()?;
        Ok(tables
            .bug_order
            .iter()
            .filter_map(|id| tables.bugs.get(id))
            .filter(|b| b.scenario_id == scenario_id)
            .cloned()
            .collect())
    }

    async fn list_history(&self, scenario_id: &str) -> Result<Vec<HistoryRecord>, StorageError> {
        let tables = self.tables()?;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.scenario_id == scenario_id)
            .cloned()
            .collect())
    }
}
