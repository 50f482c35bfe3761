//! Operational shift records (`operativos`) and their nested resources.
//!
//! The nesting mirrors the REST paths:
//!
//! ```text
//! /operativos/:turno_id
//!   /vehiculos/:vehiculo_row_id
//!     /cuadrantes/:cuadrante_row_id
//!       /novedades/:link_id
//! ```
//!
//! The backend enforces the uniqueness rules documented on each type. The
//! client never relies on them for correctness; it always searches before
//! creating and treats a 409 as "someone else created it first".

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{DispatchOutcome, Priority, ShiftSlot};

/// Response of `GET /horarios-turnos/activo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveShift {
    /// Active slot. The backend occasionally answers without one while the
    /// schedule is being edited.
    pub turno: Option<ShiftSlot>,
    /// Start time as sent by the backend (`"HH:MM"` or `"HH:MM:SS"`).
    pub hora_inicio: Option<String>,
    /// End time as sent by the backend.
    pub hora_fin: Option<String>,
}

impl ActiveShift {
    /// An active shift known only by its slot.
    #[must_use]
    pub const fn from_slot(turno: ShiftSlot) -> Self {
        Self {
            turno: Some(turno),
            hora_inicio: None,
            hora_fin: None,
        }
    }
}

/// A configured shift window, listed when no shift is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftWindow {
    pub turno: ShiftSlot,
    pub hora_inicio: String,
    pub hora_fin: String,
}

/// An operational shift (`operativo_turno`).
///
/// At most one active record exists per (`fecha`, `turno`, `sector_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationalShift {
    pub id: i64,
    pub fecha: NaiveDate,
    pub turno: ShiftSlot,
    pub sector_id: i64,
    pub operador_id: Option<i64>,
    pub supervisor_id: Option<i64>,
}

impl OperationalShift {
    /// Whether this record is the one identified by `query`.
    #[must_use]
    pub fn matches(&self, query: &ShiftQuery) -> bool {
        self.fecha == query.fecha && self.turno == query.turno && self.sector_id == query.sector_id
    }
}

/// Natural key of an operational shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShiftQuery {
    pub fecha: NaiveDate,
    pub turno: ShiftSlot,
    pub sector_id: i64,
}

impl ShiftQuery {
    /// Query-string pairs for `GET /operativos`.
    #[must_use]
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("fecha", self.fecha.format("%Y-%m-%d").to_string()),
            ("turno", self.turno.to_string()),
            ("sector_id", self.sector_id.to_string()),
        ]
    }
}

/// Body of `POST /operativos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOperationalShift {
    pub fecha: NaiveDate,
    pub turno: ShiftSlot,
    pub sector_id: i64,
    pub operador_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<i64>,
}

/// A vehicle working a shift (`operativo_vehiculo`).
///
/// At most one row exists per (shift, vehicle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInShift {
    pub id: i64,
    pub operativo_turno_id: i64,
    pub vehiculo_id: i64,
    pub conductor_id: Option<i64>,
    pub copiloto_id: Option<i64>,
    pub kilometraje_inicio: Option<f64>,
    pub kilometraje_fin: Option<f64>,
    pub nivel_combustible_inicio: Option<String>,
    pub nivel_combustible_fin: Option<String>,
    pub hora_inicio: Option<DateTime<Utc>>,
    pub hora_fin: Option<DateTime<Utc>>,
}

/// Body of `POST /operativos/:turno_id/vehiculos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVehicleInShift {
    pub vehiculo_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conductor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copiloto_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kilometraje_inicio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nivel_combustible_inicio: Option<String>,
    pub hora_inicio: DateTime<Utc>,
}

/// A vehicle patrolling a quadrant during a shift
/// (`operativo_vehiculo_cuadrante`).
///
/// At most one active row (no `hora_salida`) per (vehicle-in-shift,
/// quadrant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuadrantAssignment {
    pub id: i64,
    pub operativo_vehiculo_id: i64,
    pub cuadrante_id: i64,
    pub hora_ingreso: Option<DateTime<Utc>>,
    pub hora_salida: Option<DateTime<Utc>>,
    pub observaciones: Option<String>,
}

impl QuadrantAssignment {
    /// Whether the vehicle is still inside the quadrant.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.hora_salida.is_none()
    }
}

/// Body of `POST .../vehiculos/:veh_id/cuadrantes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuadrantAssignment {
    pub cuadrante_id: i64,
    pub hora_ingreso: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
}

/// Links an incident to the quadrant assignment that attended it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchLink {
    pub id: i64,
    pub operativo_vehiculo_cuadrante_id: i64,
    pub novedad_id: i64,
    #[serde(default)]
    pub prioridad: Priority,
    #[serde(default)]
    pub resultado: DispatchOutcome,
    pub reportado: Option<DateTime<Utc>>,
    pub observaciones: Option<String>,
}

/// Body of both `POST` and `PUT` on `.../cuadrantes/:cuad_id/novedades`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchLinkPayload {
    pub novedad_id: i64,
    pub prioridad: Priority,
    pub resultado: DispatchOutcome,
    pub reportado: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> ShiftQuery {
        ShiftQuery {
            fecha: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            turno: ShiftSlot::Tarde,
            sector_id: 3,
        }
    }

    #[test]
    fn shift_query_pairs_use_wire_formats() {
        let pairs = query().to_query_pairs();
        assert_eq!(
            pairs,
            vec![
                ("fecha", "2025-01-01".to_string()),
                ("turno", "TARDE".to_string()),
                ("sector_id", "3".to_string()),
            ]
        );
    }

    #[test]
    fn shift_matches_only_its_natural_key() {
        let shift = OperationalShift {
            id: 1,
            fecha: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            turno: ShiftSlot::Tarde,
            sector_id: 3,
            operador_id: Some(9),
            supervisor_id: None,
        };
        assert!(shift.matches(&query()));
        assert!(!shift.matches(&ShiftQuery {
            turno: ShiftSlot::Noche,
            ..query()
        }));
    }

    #[test]
    fn active_shift_tolerates_missing_slot() {
        let shift: ActiveShift =
            serde_json::from_value(serde_json::json!({ "hora_inicio": "14:00" })).unwrap();
        assert!(shift.turno.is_none());
        assert_eq!(shift.hora_inicio.as_deref(), Some("14:00"));
    }
}
