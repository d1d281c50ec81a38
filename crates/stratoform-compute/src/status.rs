//! Instance status model and the status transition table
//!
//! `Active`, `Stopped` and `Shelved` are the only addressable rest states.
//! `Error` is terminal failure. Everything else the API reports ("BUILD",
//! "RESIZE", mid-transition states) is transient and never a target.

use std::fmt;

/// Coarse instance status as understood by the reconciler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceStatus {
    Active,
    Stopped,
    Shelved,
    Error,
    /// Transient or unrecognized API status, kept verbatim
    Other(String),
}

/// Stable rest states plus Error; a transient instance is polled until it
/// lands on one of these before the transition table is consulted.
pub const SETTLED_STATUSES: &[InstanceStatus] = &[
    InstanceStatus::Active,
    InstanceStatus::Stopped,
    InstanceStatus::Shelved,
    InstanceStatus::Error,
];

impl InstanceStatus {
    /// Parse the API's uppercase wire string
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => InstanceStatus::Active,
            "SHUTOFF" | "STOPPED" => InstanceStatus::Stopped,
            "SHELVED" | "SHELVED_OFFLOADED" => InstanceStatus::Shelved,
            "ERROR" => InstanceStatus::Error,
            other => InstanceStatus::Other(other.to_string()),
        }
    }

    /// True for the three addressable rest states
    pub fn is_stable(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Active | InstanceStatus::Stopped | InstanceStatus::Shelved
        )
    }

    pub fn as_str(&self) -> &str {
        match self {
            InstanceStatus::Active => "ACTIVE",
            InstanceStatus::Stopped => "SHUTOFF",
            InstanceStatus::Shelved => "SHELVED_OFFLOADED",
            InstanceStatus::Error => "ERROR",
            InstanceStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A state-changing API action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionAction {
    Start,
    Stop,
    Shelve,
    Unshelve,
}

impl TransitionAction {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionAction::Start => "start",
            TransitionAction::Stop => "stop",
            TransitionAction::Shelve => "shelve",
            TransitionAction::Unshelve => "unshelve",
        }
    }

    /// Status the instance must reach for the action to count as converged
    pub fn expected_status(&self) -> InstanceStatus {
        match self {
            TransitionAction::Start => InstanceStatus::Active,
            TransitionAction::Stop => InstanceStatus::Stopped,
            TransitionAction::Shelve => InstanceStatus::Shelved,
            TransitionAction::Unshelve => InstanceStatus::Active,
        }
    }
}

impl fmt::Display for TransitionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ordered actions taking an instance from `current` to `desired`
///
/// Pairs without a defined edge (including equal states) yield the empty
/// slice: the engine treats them as a no-op rather than an error.
pub fn transition_actions(
    current: &InstanceStatus,
    desired: &InstanceStatus,
) -> &'static [TransitionAction] {
    use InstanceStatus::*;
    use TransitionAction::*;

    match (desired, current) {
        (Active, Stopped) => &[Start],
        (Active, Shelved) => &[Unshelve],
        (Stopped, Active) => &[Stop],
        (Stopped, Shelved) => &[Unshelve, Stop],
        (Shelved, Active) => &[Shelve],
        (Shelved, Stopped) => &[Start, Shelve],
        _ => &[],
    }
}
