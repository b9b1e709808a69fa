//! Closed status enums for steps, scenarios, packages and bugs.
//!
//! Every enum serializes as SCREAMING_SNAKE_CASE and has exactly one
//! spelling per state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a string is not a valid value of a status enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    /// Which enum was being parsed (e.g. "step status").
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Accepted spellings.
    pub allowed: &'static [&'static str],
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid {} '{}': expected one of {}",
            self.kind,
            self.value,
            self.allowed.join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

/// Generates `as_str`, `ALL_NAMES`, `Display` and `FromStr` for a unit enum
/// whose serde spelling matches the given literals.
macro_rules! status_strings {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Accepted wire spellings, in declaration order.
            pub const ALL_NAMES: &'static [&'static str] = &[$($name),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ParseStatusError {
                        kind: $kind,
                        value: other.to_string(),
                        allowed: $ty::ALL_NAMES,
                    }),
                }
            }
        }
    };
}

/// Execution outcome of a single step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    #[default]
    Pending,
    Passed,
    Failed,
    Blocked,
}

status_strings!(StepStatus, "step status", {
    Pending => "PENDING",
    Passed => "PASSED",
    Failed => "FAILED",
    Blocked => "BLOCKED",
});

impl StepStatus {
    pub fn is_blocked(self) -> bool {
        self == StepStatus::Blocked
    }
}

/// Execution status of a scenario.
///
/// Only `Blocked` is derived from the steps. The other statuses are set by
/// testers and reviewers, or by bug registration (`Failed`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    #[default]
    Created,
    Executed,
    Passed,
    Failed,
    Approved,
    Reproved,
    Blocked,
}

status_strings!(ScenarioStatus, "scenario status", {
    Created => "CREATED",
    Executed => "EXECUTED",
    Passed => "PASSED",
    Failed => "FAILED",
    Approved => "APPROVED",
    Reproved => "REPROVED",
    Blocked => "BLOCKED",
});

impl ScenarioStatus {
    /// Status a scenario moves to when it stops being fully blocked. The
    /// status it had before blocking is not retained.
    pub const RESUMED: ScenarioStatus = ScenarioStatus::Executed;

    pub fn is_blocked(self) -> bool {
        self == ScenarioStatus::Blocked
    }
}

/// Execution status of a test package.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PackageStatus {
    #[default]
    Created,
    InProgress,
    Completed,
    Approved,
    Reproved,
    Blocked,
}

status_strings!(PackageStatus, "package status", {
    Created => "CREATED",
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
    Approved => "APPROVED",
    Reproved => "REPROVED",
    Blocked => "BLOCKED",
});

impl PackageStatus {
    /// Status a package moves to when it stops being fully blocked.
    pub const RESUMED: PackageStatus = PackageStatus::InProgress;

    pub fn is_blocked(self) -> bool {
        self == PackageStatus::Blocked
    }
}

/// Bug severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

status_strings!(Severity, "severity", {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

/// Lifecycle status of a bug.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BugStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

status_strings!(BugStatus, "bug status", {
    Open => "OPEN",
    InProgress => "IN_PROGRESS",
    Resolved => "RESOLVED",
    Closed => "CLOSED",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_status_parse_accepts_canonical_names() {
        for name in StepStatus::ALL_NAMES {
            let parsed: StepStatus = name.parse().unwrap();
            assert_eq!(parsed.as_str(), *name);
        }
    }

    #[test]
    fn test_step_status_parse_rejects_unknown() {
        let err = "DONE".parse::<StepStatus>().unwrap_err();
        assert_eq!(err.kind, "step status");
        assert_eq!(err.value, "DONE");
        assert!(err.to_string().contains("PENDING, PASSED, FAILED, BLOCKED"));
    }

    #[test]
    fn test_localized_blocked_literal_is_rejected() {
        assert!("BLOQUEADO".parse::<ScenarioStatus>().is_err());
        assert!("BLOQUEADO".parse::<PackageStatus>().is_err());
        assert!(serde_json::from_str::<StepStatus>("\"BLOQUEADO\"").is_err());
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("blocked".parse::<StepStatus>().is_err());
    }

    #[test]
    fn test_serde_spelling_matches_as_str() {
        let json = serde_json::to_string(&PackageStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        assert_eq!(PackageStatus::InProgress.as_str(), "IN_PROGRESS");

        let back: ScenarioStatus = serde_json::from_str("\"REPROVED\"").unwrap();
        assert_eq!(back, ScenarioStatus::Reproved);
    }

    #[test]
    fn test_resumed_statuses() {
        assert_eq!(ScenarioStatus::RESUMED, ScenarioStatus::Executed);
        assert_eq!(PackageStatus::RESUMED, PackageStatus::InProgress);
        assert!(!ScenarioStatus::RESUMED.is_blocked());
        assert!(!PackageStatus::RESUMED.is_blocked());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(StepStatus::default(), StepStatus::Pending);
        assert_eq!(ScenarioStatus::default(), ScenarioStatus::Created);
        assert_eq!(PackageStatus::default(), PackageStatus::Created);
        assert_eq!(BugStatus::default(), BugStatus::Open);
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Low < Severity::Medium);
    }
}
