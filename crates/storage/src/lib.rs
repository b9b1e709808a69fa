mod error;
mod memory;
mod record;
mod traits;

pub mod conformance;

pub use error::{EntityKind, StorageError};
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{
    BugRecord, HistoryRecord, PackageRecord, ProjectRecord, ScenarioRecord, StepRecord, UserRecord,
};
pub use traits::TestdeckStorage;
