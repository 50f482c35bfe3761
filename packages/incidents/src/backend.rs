//! Incident, address and catalog endpoints.

use async_trait::async_trait;
use citysecure_dispatch_models::{
    Address, Incident, NewAddress, NewIncident, Personnel, Quadrant, Sector, Vehicle,
};
use citysecure_gateway::{ApiError, Gateway};

use crate::filter::{IncidentFilter, IncidentPage, parse_page};

/// Backend calls used by registration, listings and the catalog pickers.
#[async_trait]
pub trait IncidentBackend: Send + Sync {
    /// `GET /novedades` with the filter's query parameters.
    async fn list_incidents(&self, filter: &IncidentFilter) -> Result<IncidentPage, ApiError>;

    async fn get_incident(&self, id: i64) -> Result<Incident, ApiError>;

    async fn create_incident(&self, incident: &NewIncident) -> Result<Incident, ApiError>;

    /// `DELETE /novedades/:id`. The backend only sets `deleted_at`.
    async fn soft_delete_incident(&self, id: i64) -> Result<(), ApiError>;

    /// `POST /direcciones`.
    async fn create_address(&self, address: &NewAddress) -> Result<Address, ApiError>;

    async fn sectors(&self) -> Result<Vec<Sector>, ApiError> {
        self.list("/sectores").await
    }

    async fn quadrants(&self, sector_id: Option<i64>) -> Result<Vec<Quadrant>, ApiError> {
        match sector_id {
            Some(id) => {
                self.list_with_query("/cuadrantes", &[("sector_id", id)])
                    .await
            }
            None => self.list("/cuadrantes").await,
        }
    }

    async fn vehicles(&self) -> Result<Vec<Vehicle>, ApiError> {
        self.list("/vehiculos").await
    }

    async fn personnel(&self) -> Result<Vec<Personnel>, ApiError> {
        self.list("/personal").await
    }
}

#[cfg(test)]
mod tests {
    use citysecure_gateway::client::decode_list;

    use super::*;

    #[test]
    fn catalogs_decode_keyed_lists() {
        let sectors: Vec<Sector> = decode_list(serde_json::json!({
            "total": 1,
            "sectores": [{ "id": 3, "sector_code": "S03", "nombre": "Centro" }]
        }))
        .unwrap();
        assert_eq!(sectors[0].nombre, "Centro");

        let personnel: Vec<Personnel> = decode_list(serde_json::json!([
            { "id": 8, "nombres": "Ana", "apellido_paterno": "Rojas" }
        ]))
        .unwrap();
        assert_eq!(personnel[0].full_name(), "Rojas, Ana");
    }
}
