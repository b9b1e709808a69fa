//! Seed files: the JSON fixtures `testdeck serve --seed` loads into a fresh
//! store and `testdeck check-seed` validates.
//!
//! ```json
//! {
//!   "users": [{"id": "u1", "name": "Ana", "email": "ana@example.com"}],
//!   "projects": [{"id": "p1", "name": "Checkout"}],
//!   "packages": [{"id": "pkg1", "projectId": "p1", "name": "Sprint 4"}],
//!   "scenarios": [{
//!     "id": "sc1", "projectId": "p1", "packageId": "pkg1", "title": "Pay by card",
//!     "steps": [{"id": "st1", "action": "Open cart", "expectedResult": "Cart shown"}]
//!   }]
//! }
//! ```
//!
//! Statuses are taken as given; they are not checked against each other.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use testdeck_core::{PackageStatus, ScenarioStatus, StepStatus};
use testdeck_storage::{
    PackageRecord, ProjectRecord, ScenarioRecord, StepRecord, StorageError, TestdeckStorage,
    UserRecord,
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum SeedError {
    #[error("could not read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid seed:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
    #[error("could not load seed: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct SeedFile {
    pub(crate) users: Vec<SeedUser>,
    pub(crate) projects: Vec<SeedProject>,
    pub(crate) packages: Vec<SeedPackage>,
    pub(crate) scenarios: Vec<SeedScenario>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedUser {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) email: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SeedProject {
    pub(crate) id: String,
    pub(crate) name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct SeedPackage {
    pub(crate) id: String,
    pub(crate) project_id: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) status: PackageStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct SeedScenario {
    pub(crate) id: String,
    pub(crate) project_id: String,
    #[serde(default)]
    pub(crate) package_id: Option<String>,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) status: ScenarioStatus,
    #[serde(default)]
    pub(crate) steps: Vec<SeedStep>,
}

/// A seeded step. Without an explicit `ordinal` the step's position in the
/// list (from 1) is used.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct SeedStep {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) ordinal: Option<u32>,
    pub(crate) action: String,
    pub(crate) expected_result: String,
    #[serde(default)]
    pub(crate) actual_result: Option<String>,
    #[serde(default)]
    pub(crate) status: StepStatus,
}

/// Row counts of a seed file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SeedSummary {
    pub(crate) users: usize,
    pub(crate) projects: usize,
    pub(crate) packages: usize,
    pub(crate) scenarios: usize,
    pub(crate) steps: usize,
}

impl fmt::Display for SeedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} users, {} projects, {} packages, {} scenarios, {} steps",
            self.users, self.projects, self.packages, self.scenarios, self.steps
        )
    }
}

pub(crate) fn read_seed(path: &Path) -> Result<SeedFile, SeedError> {
    let content = std::fs::read_to_string(path).map_err(|source| SeedError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| SeedError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

impl SeedFile {
    /// Check ids are unique, references resolve and each scenario's
    /// ordinals run 1..=n. Every problem found is reported, not just the
    /// first.
    pub(crate) fn validate(&self) -> Result<SeedSummary, SeedError> {
        let mut errors = Vec::new();

        unique_ids("user", self.users.iter().map(|u| &u.id), &mut errors);
        let projects = unique_ids("project", self.projects.iter().map(|p| &p.id), &mut errors);
        let packages = unique_ids("package", self.packages.iter().map(|p| &p.id), &mut errors);
        unique_ids("scenario", self.scenarios.iter().map(|s| &s.id), &mut errors);
        unique_ids(
            "step",
            self.scenarios
                .iter()
                .flat_map(|s| s.steps.iter().map(|st| &st.id)),
            &mut errors,
        );

        for package in &self.packages {
            if !projects.contains(package.project_id.as_str()) {
                errors.push(format!(
                    "package '{}': unknown project '{}'",
                    package.id, package.project_id
                ));
            }
        }

        for scenario in &self.scenarios {
            if !projects.contains(scenario.project_id.as_str()) {
                errors.push(format!(
                    "scenario '{}': unknown project '{}'",
                    scenario.id, scenario.project_id
                ));
            }
            if let Some(package_id) = &scenario.package_id {
                if !packages.contains(package_id.as_str()) {
                    errors.push(format!(
                        "scenario '{}': unknown package '{}'",
                        scenario.id, package_id
                    ));
                }
            }
            let mut ordinals: Vec<u32> = scenario.ordinals().collect();
            ordinals.sort_unstable();
            if ordinals.iter().copied().ne(1..=ordinals.len() as u32) {
                errors.push(format!(
                    "scenario '{}': step ordinals {:?} are not 1..={}",
                    scenario.id,
                    ordinals,
                    ordinals.len()
                ));
            }
        }

        if !errors.is_empty() {
            return Err(SeedError::Invalid(errors));
        }
        Ok(self.summary())
    }

    fn summary(&self) -> SeedSummary {
        SeedSummary {
            users: self.users.len(),
            projects: self.projects.len(),
            packages: self.packages.len(),
            scenarios: self.scenarios.len(),
            steps: self.scenarios.iter().map(|s| s.steps.len()).sum(),
        }
    }
}

impl SeedScenario {
    fn ordinals(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps
            .iter()
            .zip(1u32..)
            .map(|(step, position)| step.ordinal.unwrap_or(position))
    }
}

fn unique_ids<'a, I>(kind: &str, ids: I, errors: &mut Vec<String>) -> BTreeSet<&'a str>
where
    I: Iterator<Item = &'a String>,
{
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id.as_str()) {
            errors.push(format!("duplicate {kind} id '{id}'"));
        }
    }
    seen
}

/// Validate `seed` and write it to `storage` in one snapshot.
pub(crate) async fn load_seed<S: TestdeckStorage>(
    storage: &S,
    seed: &SeedFile,
) -> Result<SeedSummary, SeedError> {
    let summary = seed.validate()?;
    let mut snapshot = storage.begin_snapshot().await?;
    if let Err(e) = insert_all(storage, &mut snapshot, seed).await {
        let _ = storage.abort_snapshot(snapshot).await;
        return Err(e.into());
    }
    storage.commit_snapshot(snapshot).await?;
    Ok(summary)
}

async fn insert_all<S: TestdeckStorage>(
    storage: &S,
    snapshot: &mut S::Snapshot,
    seed: &SeedFile,
) -> Result<(), StorageError> {
    for user in &seed.users {
        let record = UserRecord {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        };
        storage.insert_user(snapshot, record).await?;
    }
    for project in &seed.projects {
        let record = ProjectRecord {
            id: project.id.clone(),
            name: project.name.clone(),
        };
        storage.insert_project(snapshot, record).await?;
    }
    for package in &seed.packages {
        let record = PackageRecord {
            id: package.id.clone(),
            project_id: package.project_id.clone(),
            name: package.name.clone(),
            status: package.status,
            version: 0,
        };
        storage.insert_package(snapshot, record).await?;
    }
    for scenario in &seed.scenarios {
        let record = ScenarioRecord {
            id: scenario.id.clone(),
            project_id: scenario.project_id.clone(),
            package_id: scenario.package_id.clone(),
            title: scenario.title.clone(),
            status: scenario.status,
            version: 0,
        };
        storage.insert_scenario(snapshot, record).await?;
        for (step, ordinal) in scenario.steps.iter().zip(scenario.ordinals()) {
            let record = StepRecord {
                id: step.id.clone(),
                scenario_id: scenario.id.clone(),
                ordinal,
                action: step.action.clone(),
                expected_result: step.expected_result.clone(),
                actual_result: step.actual_result.clone(),
                status: step.status,
                version: 0,
            };
            storage.insert_step(snapshot, record).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use testdeck_storage::MemoryStorage;

    fn seed(value: serde_json::Value) -> SeedFile {
        serde_json::from_value(value).unwrap()
    }

    fn demo() -> SeedFile {
        seed(serde_json::json!({
            "users": [{"id": "u1", "name": "Ana", "email": "ana@example.com"}],
            "projects": [{"id": "p1", "name": "Checkout"}],
            "packages": [{"id": "pkg1", "projectId": "p1", "name": "Sprint 4"}],
            "scenarios": [
                {
                    "id": "sc1", "projectId": "p1", "packageId": "pkg1", "title": "Card",
                    "steps": [
                        {"id": "st1", "action": "Open cart", "expectedResult": "Cart shown"},
                        {"id": "st2", "action": "Pay", "expectedResult": "Receipt", "status": "BLOCKED"}
                    ]
                },
                {"id": "sc2", "projectId": "p1", "title": "Empty", "status": "PASSED"}
            ]
        }))
    }

    #[test]
    fn test_valid_seed_summary() {
        let summary = demo().validate().unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                users: 1,
                projects: 1,
                packages: 1,
                scenarios: 2,
                steps: 2,
            }
        );
        assert_eq!(
            summary.to_string(),
            "1 users, 1 projects, 1 packages, 2 scenarios, 2 steps"
        );
    }

    #[test]
    fn test_every_problem_reported() {
        let bad = seed(serde_json::json!({
            "projects": [{"id": "p1", "name": "A"}, {"id": "p1", "name": "B"}],
            "scenarios": [{
                "id": "sc1", "projectId": "p2", "packageId": "nope", "title": "T",
                "steps": [
                    {"id": "st1", "ordinal": 1, "action": "a", "expectedResult": "e"},
                    {"id": "st1", "ordinal": 3, "action": "b", "expectedResult": "f"}
                ]
            }]
        }));
        match bad.validate() {
            Err(SeedError::Invalid(errors)) => {
                assert_eq!(errors.len(), 5, "{errors:?}");
                assert!(errors.iter().any(|e| e == "duplicate project id 'p1'"));
                assert!(errors.iter().any(|e| e == "duplicate step id 'st1'"));
                assert!(errors.iter().any(|e| e.contains("unknown project 'p2'")));
                assert!(errors.iter().any(|e| e.contains("unknown package 'nope'")));
                assert!(errors.iter().any(|e| e.contains("[1, 3]")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_localized_blocked_spelling_rejected() {
        let result: Result<SeedFile, _> = serde_json::from_value(serde_json::json!({
            "projects": [{"id": "p1", "name": "A"}],
            "scenarios": [{"id": "s", "projectId": "p1", "title": "T", "status": "BLOQUEADO"}]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_read_seed_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = read_seed(file.path()).unwrap_err();
        assert!(matches!(err, SeedError::Parse { .. }));
        assert!(err.to_string().contains(&file.path().display().to_string()));
    }

    #[tokio::test]
    async fn test_load_seed_populates_storage() {
        let storage = MemoryStorage::new();
        load_seed(&storage, &demo()).await.unwrap();

        let steps = storage.list_steps("sc1").await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].status, StepStatus::Blocked);
        assert_eq!(storage.list_package_scenarios("pkg1").await.unwrap().len(), 1);
        assert_eq!(
            storage.get_scenario("sc2").await.unwrap().status,
            ScenarioStatus::Passed
        );
        assert_eq!(storage.get_user("u1").await.unwrap().name, "Ana");
    }

    #[tokio::test]
    async fn test_invalid_seed_loads_nothing() {
        let storage = MemoryStorage::new();
        let mut bad = demo();
        bad.scenarios[1].project_id = "ghost".into();
        assert!(load_seed(&storage, &bad).await.is_err());
        assert!(storage.get_project("p1").await.is_err());
    }
}
