//! Stratoform reconciliation core
//!
//! Turns a declared instance configuration into an ordered sequence of
//! compute API actions and drives each one to convergence:
//!
//! ```text
//! desired config ──▶ resolve (pin port ids)
//!                      │
//!                      ▼
//!                    diff (volume / interface op lists)
//!                      │
//!                      ▼
//!                    reconciler ──▶ mutate ──▶ poll read-back
//!                      │                          │
//!                      └── status table walk ◀────┘
//! ```
//!
//! Each mutating step is confirmed by polling the instance's refreshed
//! remote view rather than by trusting the mutating call's response. Within
//! one pass operations run strictly in order; a failure aborts the rest and
//! names the sub-resource involved, leaving partial application for the next
//! pass to reconcile.

pub mod diff;
pub mod error;
pub mod model;
pub mod poll;
pub mod reconciler;
pub mod resolve;
pub mod status;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

// Re-exports
pub use diff::{InterfaceOp, VolumeOp, diff_interfaces, diff_volumes};
pub use error::{ComputeError, Result};
pub use model::{DesiredInterface, DesiredVolume};
pub use poll::OperationDeadline;
pub use reconciler::Reconciler;
pub use resolve::resolve_interface_ids;
pub use status::{InstanceStatus, SETTLED_STATUSES, TransitionAction, transition_actions};
