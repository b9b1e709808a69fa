//! testdeck engine -- the operations that change execution state.
//!
//! Every mutating operation runs in a single storage snapshot: the write
//! itself, both propagation stages and any history entries commit
//! together, or the snapshot is aborted and nothing is applied. When another
//! operation commits a change to the same rows first, the later one fails
//! with [`EngineError::Conflict`].
//!
//! All operations are generic over [`testdeck_storage::TestdeckStorage`].

pub mod bug;
pub mod error;
pub mod history;
pub mod propagation;
pub mod readers;
pub mod step;

mod ids;
mod snapshot;

pub use bug::{list_bugs, register_bug, update_bug_status, NewBug};
pub use error::EngineError;
pub use history::{action, list_history, record_history, HistoryEntry, NewHistoryEntry};
pub use propagation::{propagate, reconcile_scenario, PropagationOutcome, StatusChange};
pub use readers::{read_package, read_scenario, PackageAggregate, ScenarioAggregate};
pub use step::{
    replace_steps, update_step_status, NewStep, ReplaceSteps, ReplaceStepsOutcome,
    StepStatusOutcome, StepStatusUpdate,
};
