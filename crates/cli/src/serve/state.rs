//! Application state shared across request handlers.

use testdeck_storage::TestdeckStorage;

pub(crate) struct AppState<S: TestdeckStorage> {
    pub(crate) storage: S,
}

impl<S: TestdeckStorage> AppState<S> {
    pub(crate) fn new(storage: S) -> Self {
        Self { storage }
    }
}
