//! Blocking derivation rules.
//!
//! A scenario is blocked when it has at least one step and every step is
//! `BLOCKED`. A package is blocked when it has at least one scenario and
//! every scenario counts as blocked, where a scenario counts either because
//! its persisted status is already `BLOCKED` or because its steps say so.
//! Empty collections are never blocked.

use crate::status::{ScenarioStatus, StepStatus};

/// True iff `outcomes` is non-empty and every outcome is `BLOCKED`.
pub fn derive_blocked<I>(outcomes: I) -> bool
where
    I: IntoIterator<Item = StepStatus>,
{
    let mut seen_any = false;
    for outcome in outcomes {
        if !outcome.is_blocked() {
            return false;
        }
        seen_any = true;
    }
    seen_any
}

/// Package-level view of one scenario.
///
/// The persisted status is trusted when it is already `BLOCKED`; otherwise
/// the step outcomes decide, which covers a scenario whose own status write
/// has not landed yet.
pub fn scenario_counts_as_blocked<I>(status: ScenarioStatus, outcomes: I) -> bool
where
    I: IntoIterator<Item = StepStatus>,
{
    status.is_blocked() || derive_blocked(outcomes)
}

/// True iff `scenarios` is non-empty and every scenario counts as blocked.
pub fn derive_package_blocked<I, S>(scenarios: I) -> bool
where
    I: IntoIterator<Item = (ScenarioStatus, S)>,
    S: IntoIterator<Item = StepStatus>,
{
    let mut seen_any = false;
    for (status, outcomes) in scenarios {
        if !scenario_counts_as_blocked(status, outcomes) {
            return false;
        }
        seen_any = true;
    }
    seen_any
}

#[cfg(test)]
mod tests {
    use super::*;
    use StepStatus::*;

    #[test]
    fn test_empty_steps_never_blocked() {
        assert!(!derive_blocked(Vec::<StepStatus>::new()));
    }

    #[test]
    fn test_all_blocked_steps() {
        assert!(derive_blocked([Blocked]));
        assert!(derive_blocked([Blocked, Blocked, Blocked]));
    }

    #[test]
    fn test_one_unblocked_step_breaks_the_rule() {
        assert!(!derive_blocked([Blocked, Passed, Blocked]));
        assert!(!derive_blocked([Blocked, Blocked, Pending]));
        assert!(!derive_blocked([Failed]));
    }

    #[test]
    fn test_scenario_trusts_persisted_blocked_status() {
        // Steps disagree, but the stored status is trusted.
        assert!(scenario_counts_as_blocked(ScenarioStatus::Blocked, [Passed]));
        assert!(scenario_counts_as_blocked(
            ScenarioStatus::Blocked,
            Vec::<StepStatus>::new()
        ));
    }

    #[test]
    fn test_scenario_falls_back_to_steps_when_status_stale() {
        assert!(scenario_counts_as_blocked(
            ScenarioStatus::Executed,
            [Blocked, Blocked]
        ));
        assert!(!scenario_counts_as_blocked(
            ScenarioStatus::Executed,
            [Blocked, Passed]
        ));
        assert!(!scenario_counts_as_blocked(
            ScenarioStatus::Created,
            Vec::<StepStatus>::new()
        ));
    }

    #[test]
    fn test_empty_package_never_blocked() {
        let scenarios: Vec<(ScenarioStatus, Vec<StepStatus>)> = Vec::new();
        assert!(!derive_package_blocked(scenarios));
    }

    #[test]
    fn test_package_blocked_when_every_scenario_counts() {
        let scenarios = vec![
            (ScenarioStatus::Blocked, vec![Blocked, Blocked]),
            (ScenarioStatus::Failed, vec![Blocked]),
        ];
        assert!(derive_package_blocked(scenarios));
    }

    #[test]
    fn test_package_not_blocked_with_one_live_scenario() {
        let scenarios = vec![
            (ScenarioStatus::Blocked, vec![Blocked]),
            (ScenarioStatus::Executed, vec![Blocked, Passed]),
        ];
        assert!(!derive_package_blocked(scenarios));
    }

    #[test]
    fn test_package_with_stepless_unblocked_scenario() {
        let scenarios = vec![
            (ScenarioStatus::Blocked, vec![Blocked]),
            (ScenarioStatus::Created, vec![]),
        ];
        assert!(!derive_package_blocked(scenarios));
    }
}
