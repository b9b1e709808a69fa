use testdeck_storage::{EntityKind, StorageError};

/// Errors surfaced by engine operations.
///
/// Each variant maps onto one class of HTTP status in the serve layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A referenced step, scenario, package or bug does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: EntityKind, id: String },

    /// The request itself is malformed: empty required text, a step that
    /// belongs elsewhere, and so on.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Another operation committed a change to the same rows first. Nothing
    /// from this operation was applied.
    #[error("conflicting update: {0}")]
    Conflict(String),

    /// Storage or other infrastructure failure.
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl EngineError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { kind, id } => EngineError::NotFound { kind, id },
            StorageError::ConcurrentConflict { .. } => EngineError::Conflict(e.to_string()),
            StorageError::AlreadyExists { .. } | StorageError::Backend(_) => {
                EngineError::Unexpected(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_not_found_keeps_kind_and_id() {
        let err: EngineError = StorageError::NotFound {
            kind: EntityKind::Step,
            id: "st-9".into(),
        }
        .into();
        assert!(matches!(
            err,
            EngineError::NotFound { kind: EntityKind::Step, ref id } if id == "st-9"
        ));
        assert_eq!(err.to_string(), "step 'st-9' not found");
    }

    #[test]
    fn test_storage_conflict_becomes_conflict() {
        let err: EngineError = StorageError::ConcurrentConflict {
            kind: EntityKind::Scenario,
            id: "sc-1".into(),
            expected_version: 3,
        }
        .into();
        match err {
            EngineError::Conflict(msg) => assert!(msg.contains("sc-1"), "{msg}"),
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_backend_and_duplicate_are_unexpected() {
        let backend: EngineError = StorageError::Backend("disk gone".into()).into();
        assert!(matches!(backend, EngineError::Unexpected(_)));
        let dup: EngineError = StorageError::AlreadyExists {
            kind: EntityKind::Bug,
            id: "bug-1".into(),
        }
        .into();
        assert!(matches!(dup, EngineError::Unexpected(_)));
    }
}
