//! Registered addresses (`direcciones`).

use serde::{Deserialize, Serialize};

/// An address known to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub calle: Option<String>,
    pub numero: Option<String>,
    pub manzana: Option<String>,
    pub lote: Option<String>,
    pub urbanizacion: Option<String>,
    /// Concatenated one-line form used for display and search.
    pub direccion_completa: Option<String>,
    pub sector_id: Option<i64>,
    pub cuadrante_id: Option<i64>,
    pub latitud: Option<f64>,
    pub longitud: Option<f64>,
    pub ubigeo_code: Option<String>,
}

/// Body of `POST /direcciones`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAddress {
    pub calle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numero: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manzana: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urbanizacion: Option<String>,
    pub direccion_completa: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuadrante_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitud: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitud: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ubigeo_code: Option<String>,
}
