#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident dispatch workflow.
//!
//! Dispatching an incident touches a chain of nested backend records, each
//! of which may already exist because another operator dispatched to the
//! same shift, vehicle or quadrant:
//!
//! 1. operational shift for (local date, active slot, sector)
//! 2. vehicle-in-shift for the selected vehicle
//! 3. quadrant assignment for the incident's quadrant
//! 4. dispatch link between the assignment and the incident
//! 5. the incident itself, moved to `DESPACHADO`
//!
//! Every step searches first and creates only when nothing matches; a 409
//! on create means another client won the race, and the existing record is
//! fetched and used instead. See [`orchestrator::Dispatcher`].
//!
//! When a step fails, records created by the same dispatch are deleted
//! again (see [`saga`]).

pub mod backend;
pub mod clock;
pub mod orchestrator;
pub mod saga;
pub mod shift;

#[cfg(test)]
mod fake;

use citysecure_dispatch_models::{IncidentStatus, ShiftWindow};
use citysecure_gateway::ApiError;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub use backend::{AssignmentPath, DispatchBackend};
pub use clock::{Clock, FixedClock, SystemClock};
pub use orchestrator::{
    DispatchReport, DispatchRequest, DispatchSelections, Dispatcher, RecordAction, RecordOutcome,
    Resolved,
};
pub use saga::{RecordKind, RecordRef, RollbackReport, SagaLedger};
pub use shift::{ShiftResolver, ShiftState};

/// Step of the dispatch chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum DispatchStep {
    #[strum(to_string = "operational shift")]
    OperationalShift,
    #[strum(to_string = "vehicle-in-shift")]
    VehicleInShift,
    #[strum(to_string = "quadrant assignment")]
    QuadrantAssignment,
    #[strum(to_string = "dispatch link")]
    DispatchLink,
    #[strum(to_string = "incident update")]
    IncidentUpdate,
}

/// Errors from dispatching an incident.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The incident has no sector, so no operational shift can be chosen.
    #[error("Incident {incident_id} has no sector; assign one before dispatching")]
    MissingSector {
        /// Incident id.
        incident_id: i64,
    },

    /// The incident is closed, attended or deleted.
    #[error("Incident {incident_id} cannot be dispatched ({reason})")]
    NotDispatchable {
        /// Incident id.
        incident_id: i64,
        /// Current status, or `deleted`.
        reason: String,
    },

    /// Nobody to record as the operator of a new operational shift.
    #[error("No operator id available; log in or set CITYSECURE_OPERATOR_ID")]
    MissingOperator,

    /// No shift slot could be determined.
    #[error("No active shift{}", describe_windows(windows))]
    NoActiveShift {
        /// Configured shift windows, if the backend listed them.
        windows: Vec<ShiftWindow>,
    },

    /// Looking up the active shift failed and no slot was cached.
    #[error("Active shift lookup failed: {0}")]
    ShiftLookup(#[source] ApiError),

    /// A backend step failed. Records created before it were rolled back.
    #[error("Dispatch failed at {step}: {source} ({rollback})")]
    StepFailed {
        /// Step that failed.
        step: DispatchStep,
        /// Backend error.
        source: ApiError,
        /// What the rollback did.
        rollback: RollbackReport,
    },
}

impl DispatchError {
    /// The backend error behind this failure, if any.
    #[must_use]
    pub const fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::ShiftLookup(e) | Self::StepFailed { source: e, .. } => Some(e),
            _ => None,
        }
    }

    pub(crate) fn not_dispatchable(incident_id: i64, status: IncidentStatus) -> Self {
        Self::NotDispatchable {
            incident_id,
            reason: status.to_string(),
        }
    }
}

fn describe_windows(windows: &[ShiftWindow]) -> String {
    if windows.is_empty() {
        return String::new();
    }
    let listed: Vec<String> = windows
        .iter()
        .map(|w| format!("{} {}-{}", w.turno, w.hora_inicio, w.hora_fin))
        .collect();
    format!("; configured shifts: {}", listed.join(", "))
}

#[cfg(test)]
mod tests {
    use citysecure_dispatch_models::ShiftSlot;

    use super::*;

    #[test]
    fn no_active_shift_lists_windows() {
        let err = DispatchError::NoActiveShift {
            windows: vec![ShiftWindow {
                turno: ShiftSlot::Manana,
                hora_inicio: "06:00".to_string(),
                hora_fin: "14:00".to_string(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "No active shift; configured shifts: MAÑANA 06:00-14:00"
        );
        assert_eq!(
            DispatchError::NoActiveShift { windows: vec![] }.to_string(),
            "No active shift"
        );
    }

    #[test]
    fn closed_incident_message() {
        let err = DispatchError::not_dispatchable(9, IncidentStatus::Cerrado);
        assert_eq!(
            err.to_string(),
            "Incident 9 cannot be dispatched (CERRADO)"
        );
        assert!(err.api_error().is_none());
    }
}
