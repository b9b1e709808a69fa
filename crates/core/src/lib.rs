//! testdeck core -- the execution status model and the pure rules that
//! derive a "blocked" status bottom-up from steps to scenarios to packages.
//!
//! Nothing in this crate performs I/O. The engine crate reads aggregates
//! from storage, feeds their statuses through [`derive`] and [`transition`],
//! and persists whatever transition comes back.

pub mod derive;
pub mod status;
pub mod transition;

pub use derive::{derive_blocked, derive_package_blocked, scenario_counts_as_blocked};
pub use status::{BugStatus, PackageStatus, ParseStatusError, ScenarioStatus, Severity, StepStatus};
pub use transition::{next_package_status, next_scenario_status, ScenarioTrigger};
