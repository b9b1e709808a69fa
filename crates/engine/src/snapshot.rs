use testdeck_storage::TestdeckStorage;

use crate::error::EngineError;

/// Roll back a snapshot after `op` failed. The abort result is ignored; the
/// original error is what the caller reports.
pub(crate) async fn abort<S: TestdeckStorage>(
    storage: &S,
    snapshot: S::Snapshot,
    op: &'static str,
    err: &EngineError,
) {
    tracing::warn!(op, error = %err, "operation failed, snapshot aborted");
    let _ = storage.abort_snapshot(snapshot).await;
}

/// Commit a snapshot, logging conflicts so racing writers are visible.
pub(crate) async fn commit<S: TestdeckStorage>(
    storage: &S,
    snapshot: S::Snapshot,
    op: &'static str,
) -> Result<(), EngineError> {
    storage.commit_snapshot(snapshot).await.map_err(|e| {
        let err = EngineError::from(e);
        tracing::warn!(op, error = %err, "commit rejected");
        err
    })
}
