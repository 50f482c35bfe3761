#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record types for the CitySecure incident dispatch client.
//!
//! Every entity here is owned by the remote backend. The client only holds
//! transient copies, so these types mirror the backend's JSON contract
//! (Spanish `snake_case` field names, `SCREAMING_SNAKE_CASE` enum values)
//! rather than an internal representation.

pub mod address;
pub mod catalog;
pub mod incident;
pub mod operativo;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use address::{Address, NewAddress};
pub use catalog::{Personnel, Quadrant, Sector, Vehicle};
pub use incident::{Incident, IncidentDispatchUpdate, NewIncident};
pub use operativo::{
    ActiveShift, DispatchLink, DispatchLinkPayload, NewOperationalShift, NewQuadrantAssignment,
    NewVehicleInShift, OperationalShift, QuadrantAssignment, ShiftQuery, ShiftWindow,
    VehicleInShift,
};

/// Urgency assigned to an incident and carried onto its dispatch link.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Priority {
    /// Immediate response required.
    Alta,
    /// Default urgency.
    #[default]
    Media,
    /// Can wait for a free unit.
    Baja,
}

/// Channel through which an incident was reported.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum CallOrigin {
    /// Emergency phone line 107.
    #[serde(rename = "TELEFONO_107")]
    #[strum(serialize = "TELEFONO_107")]
    Telefono107,
    /// TETRA radio network.
    RadioTetra,
    /// Social media report.
    RedesSociales,
    /// Panic button.
    BotonEmergencia,
    /// Field officer intervened directly.
    IntervencionDirecta,
    /// CCTV operator.
    Videovigilancia,
    /// Any other channel.
    Otro,
}

/// Work shift slot within a day.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ShiftSlot {
    /// Morning shift.
    #[serde(rename = "MAÑANA", alias = "MANANA")]
    #[strum(to_string = "MAÑANA", serialize = "MANANA")]
    Manana,
    /// Afternoon shift.
    #[serde(rename = "TARDE")]
    #[strum(serialize = "TARDE")]
    Tarde,
    /// Night shift.
    #[serde(rename = "NOCHE")]
    #[strum(serialize = "NOCHE")]
    Noche,
}

/// Lifecycle status of an incident.
///
/// Incidents only move forward: `Pendiente` → `Despachado` → `Atendido` →
/// `Cerrado`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum IncidentStatus {
    /// Registered, nobody assigned yet.
    #[default]
    Pendiente,
    /// Resources have been sent.
    Despachado,
    /// Resources arrived and handled the incident.
    Atendido,
    /// Closed; no further changes.
    Cerrado,
}

impl IncidentStatus {
    /// Whether resources can (still) be dispatched to an incident in this
    /// status. Re-dispatching an already dispatched incident is allowed so a
    /// second unit can be sent.
    #[must_use]
    pub const fn can_dispatch(self) -> bool {
        matches!(self, Self::Pendiente | Self::Despachado)
    }
}

/// Outcome recorded on a dispatch link.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum DispatchOutcome {
    /// Unit en route.
    #[default]
    Pendiente,
    /// Unit on scene.
    EnProceso,
    /// Situation resolved.
    Resuelto,
    /// Unit left without resolving.
    NoResuelto,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn shift_slot_uses_accented_wire_name() {
        let json = serde_json::to_string(&ShiftSlot::Manana).unwrap();
        assert_eq!(json, "\"MAÑANA\"");
        let parsed: ShiftSlot = serde_json::from_str("\"MANANA\"").unwrap();
        assert_eq!(parsed, ShiftSlot::Manana);
        assert_eq!(ShiftSlot::from_str("tarde").unwrap(), ShiftSlot::Tarde);
    }

    #[test]
    fn call_origin_keeps_numeric_suffix() {
        let json = serde_json::to_string(&CallOrigin::Telefono107).unwrap();
        assert_eq!(json, "\"TELEFONO_107\"");
        assert_eq!(CallOrigin::RadioTetra.as_ref(), "RADIO_TETRA");
    }

    #[test]
    fn only_open_incidents_can_be_dispatched() {
        assert!(IncidentStatus::Pendiente.can_dispatch());
        assert!(IncidentStatus::Despachado.can_dispatch());
        assert!(!IncidentStatus::Atendido.can_dispatch());
        assert!(!IncidentStatus::Cerrado.can_dispatch());
    }
}
