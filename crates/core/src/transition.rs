//! Status transition rules.
//!
//! Every automatic change to a scenario or package status goes through one
//! of the functions here. They return `None` when the current status
//! already satisfies the rule, so callers write nothing on a no-op.

use crate::status::{PackageStatus, ScenarioStatus};

/// What caused a scenario status to be re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioTrigger {
    /// A step outcome or the step set changed. `all_blocked` is the result
    /// of [`derive_blocked`](crate::derive_blocked) over the fresh step list.
    StepsChanged { all_blocked: bool },
    /// A bug was registered against the scenario.
    BugRaised,
}

/// Compute the next scenario status for `trigger`, or `None` for no change.
///
/// - Steps all blocked: move into `BLOCKED` unless already there.
/// - Steps not all blocked while `BLOCKED`: move to [`ScenarioStatus::RESUMED`].
/// - Steps not all blocked otherwise: leave the status alone.
/// - Bug raised: move to `FAILED` unless already there, whatever the blocked
///   state. A later `StepsChanged` re-derives `BLOCKED` from the steps.
pub fn next_scenario_status(
    current: ScenarioStatus,
    trigger: ScenarioTrigger,
) -> Option<ScenarioStatus> {
    match trigger {
        ScenarioTrigger::StepsChanged { all_blocked: true } if !current.is_blocked() => {
            Some(ScenarioStatus::Blocked)
        }
        ScenarioTrigger::StepsChanged { all_blocked: false } if current.is_blocked() => {
            Some(ScenarioStatus::RESUMED)
        }
        ScenarioTrigger::StepsChanged { .. } => None,
        ScenarioTrigger::BugRaised if current != ScenarioStatus::Failed => {
            Some(ScenarioStatus::Failed)
        }
        ScenarioTrigger::BugRaised => None,
    }
}

/// Compute the next package status, or `None` for no change.
pub fn next_package_status(current: PackageStatus, all_blocked: bool) -> Option<PackageStatus> {
    match (all_blocked, current.is_blocked()) {
        (true, false) => Some(PackageStatus::Blocked),
        (false, true) => Some(PackageStatus::RESUMED),
        _ => None,
    }
}
