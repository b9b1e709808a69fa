use std::fmt;

/// The kinds of rows a `TestdeckStorage` backend holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Project,
    User,
    Package,
    Scenario,
    Step,
    Bug,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Project => "project",
            EntityKind::User => "user",
            EntityKind::Package => "package",
            EntityKind::Scenario => "scenario",
            EntityKind::Step => "step",
            EntityKind::Bug => "bug",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors that can be returned by a TestdeckStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict -- another snapshot modified
    /// the row first. `expected_version` is the version this snapshot saw,
    /// or -1 if it saw no row at all.
    #[error("concurrent conflict on {kind} {id}: expected version {expected_version}")]
    ConcurrentConflict {
        kind: EntityKind,
        id: String,
        expected_version: i64,
    },

    /// No row with the given id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// A row with this id already exists.
    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: EntityKind, id: String },

    /// A backend-specific storage error (connection, serialization, poisoned lock, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub(crate) fn not_found(kind: EntityKind, id: &str) -> Self {
        StorageError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}
