//! Incident (`novedad`) records and the payloads that create or mutate them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CallOrigin, IncidentStatus, Priority};

/// An incident as returned by `GET /novedades/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    /// Backend primary key.
    pub id: i64,
    /// Human-facing code (e.g. `"NOV-2025-000123"`).
    pub novedad_code: Option<String>,
    /// Incident type.
    pub tipo_novedad_id: Option<i64>,
    /// Incident subtype.
    pub subtipo_novedad_id: Option<i64>,
    /// Urgency.
    #[serde(default)]
    pub prioridad: Priority,
    /// How the incident was reported.
    pub origen_llamada: Option<CallOrigin>,
    /// Registered address, if any.
    pub direccion_id: Option<i64>,
    /// Free-text location reference.
    pub localizacion: Option<String>,
    /// Patrol sector. Required before dispatching.
    pub sector_id: Option<i64>,
    /// Patrol quadrant inside the sector.
    pub cuadrante_id: Option<i64>,
    /// Latitude (WGS84).
    pub latitud: Option<f64>,
    /// Longitude (WGS84).
    pub longitud: Option<f64>,
    /// Ubigeo district code.
    pub ubigeo_code: Option<String>,
    /// Whether the reporter asked to stay anonymous.
    #[serde(default)]
    pub es_anonimo: bool,
    /// Reporter name.
    pub reportante_nombre: Option<String>,
    /// Reporter phone.
    pub reportante_telefono: Option<String>,
    /// Reporter identity document.
    pub reportante_doc_identidad: Option<String>,
    /// Free-text description.
    pub descripcion: Option<String>,
    /// Lifecycle status.
    #[serde(default)]
    pub estado: IncidentStatus,
    /// When the incident happened.
    pub fecha_hora_ocurrencia: Option<DateTime<Utc>>,
    /// When resources were dispatched.
    pub fecha_despacho: Option<DateTime<Utc>>,
    /// Office unit in charge.
    pub unidad_oficina_id: Option<i64>,
    /// Vehicle sent.
    pub vehiculo_id: Option<i64>,
    /// Officer in charge.
    pub personal_cargo_id: Option<i64>,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update timestamp.
    pub updated_at: Option<DateTime<Utc>>,
    /// Soft-delete marker. Incidents are never hard-deleted.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Incident {
    /// Whether the incident has been soft-deleted.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Body of `POST /novedades`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewIncident {
    pub tipo_novedad_id: i64,
    pub subtipo_novedad_id: i64,
    pub prioridad: Priority,
    pub origen_llamada: CallOrigin,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direccion_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub localizacion: Option<String>,
    pub sector_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuadrante_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitud: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitud: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ubigeo_code: Option<String>,
    pub es_anonimo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reportante_nombre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reportante_telefono: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reportante_doc_identidad: Option<String>,
    pub descripcion: String,
    pub estado: IncidentStatus,
    pub fecha_hora_ocurrencia: DateTime<Utc>,
}

/// Body of the `PUT /novedades/:id` call that closes a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDispatchUpdate {
    /// Always [`IncidentStatus::Despachado`].
    pub estado: IncidentStatus,
    /// Dispatch timestamp.
    pub fecha_despacho: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unidad_oficina_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehiculo_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personal_cargo_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observaciones: Option<String>,
}
