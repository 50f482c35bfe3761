//! Remote operations used by the dispatch workflow.
//!
//! [`DispatchBackend`] is implemented for [`Gateway`] against the REST
//! endpoints below; tests substitute an in-memory backend. Listings may
//! arrive bare or paginated (`{ "items": [..], "pagination": {..} }`).
//!
//! ```text
//! GET  /horarios-turnos/activo
//! GET  /operativos?fecha=&turno=&sector_id=          POST /operativos
//! GET  /operativos/:turno/vehiculos                   POST, DELETE /:id
//! GET  /operativos/:turno/vehiculos/:veh/cuadrantes   POST, DELETE /:id
//! GET  .../cuadrantes/:cuad/novedades                 POST, PUT, DELETE /:id
//! PUT  /novedades/:id
//! ```

use async_trait::async_trait;
use citysecure_dispatch_models::{
    ActiveShift, DispatchLink, DispatchLinkPayload, Incident, IncidentDispatchUpdate,
    NewOperationalShift, NewQuadrantAssignment, NewVehicleInShift, OperationalShift,
    QuadrantAssignment, ShiftQuery, VehicleInShift,
};
use citysecure_gateway::{ApiError, Gateway};
use serde::Serialize;

/// Location of a quadrant assignment in the nested REST paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AssignmentPath {
    /// Operational shift id.
    pub shift_id: i64,
    /// Vehicle-in-shift row id.
    pub vehicle_row_id: i64,
    /// Quadrant assignment row id.
    pub quadrant_row_id: i64,
}

impl AssignmentPath {
    fn links(&self) -> String {
        format!(
            "{}/{}/novedades",
            quadrants_path(self.shift_id, self.vehicle_row_id),
            self.quadrant_row_id
        )
    }
}

fn vehicles_path(shift_id: i64) -> String {
    format!("/operativos/{shift_id}/vehiculos")
}

fn quadrants_path(shift_id: i64, vehicle_row_id: i64) -> String {
    format!("{}/{vehicle_row_id}/cuadrantes", vehicles_path(shift_id))
}

/// Backend calls made while dispatching an incident.
#[async_trait]
pub trait DispatchBackend: Send + Sync {
    /// The currently active work shift. A 404 means no shift is active.
    async fn active_shift(&self) -> Result<ActiveShift, ApiError>;

    /// Operational shifts matching `query`.
    async fn list_shifts(&self, query: &ShiftQuery) -> Result<Vec<OperationalShift>, ApiError>;

    async fn create_shift(&self, shift: &NewOperationalShift)
    -> Result<OperationalShift, ApiError>;

    /// Vehicles working the operational shift `shift_id`.
    async fn list_shift_vehicles(&self, shift_id: i64) -> Result<Vec<VehicleInShift>, ApiError>;

    async fn create_shift_vehicle(
        &self,
        shift_id: i64,
        vehicle: &NewVehicleInShift,
    ) -> Result<VehicleInShift, ApiError>;

    async fn delete_shift_vehicle(&self, shift_id: i64, id: i64) -> Result<(), ApiError>;

    /// Quadrant assignments of one vehicle-in-shift row.
    async fn list_quadrant_assignments(
        &self,
        shift_id: i64,
        vehicle_row_id: i64,
    ) -> Result<Vec<QuadrantAssignment>, ApiError>;

    async fn create_quadrant_assignment(
        &self,
        shift_id: i64,
        vehicle_row_id: i64,
        assignment: &NewQuadrantAssignment,
    ) -> Result<QuadrantAssignment, ApiError>;

    async fn delete_quadrant_assignment(
        &self,
        shift_id: i64,
        vehicle_row_id: i64,
        id: i64,
    ) -> Result<(), ApiError>;

    /// Incidents linked to a quadrant assignment.
    async fn list_dispatch_links(&self, path: &AssignmentPath)
    -> Result<Vec<DispatchLink>, ApiError>;

    async fn create_dispatch_link(
        &self,
        path: &AssignmentPath,
        link: &DispatchLinkPayload,
    ) -> Result<DispatchLink, ApiError>;

    async fn update_dispatch_link(
        &self,
        path: &AssignmentPath,
        id: i64,
        link: &DispatchLinkPayload,
    ) -> Result<DispatchLink, ApiError>;

    async fn delete_dispatch_link(&self, path: &AssignmentPath, id: i64) -> Result<(), ApiError>;

    /// Marks an incident as dispatched.
    async fn update_incident(
        &self,
        id: i64,
        update: &IncidentDispatchUpdate,
    ) -> Result<Incident, ApiError>;
}

#[async_trait]
impl DispatchBackend for Gateway {
    async fn active_shift(&self) -> Result<ActiveShift, ApiError> {
        self.get("/horarios-turnos/activo").await
    }

    async fn list_shifts(&self, query: &ShiftQuery) -> Result<Vec<OperationalShift>, ApiError> {
        self.list_with_query("/operativos", &query.to_query_pairs())
            .await
    }

    async fn create_shift(
        &self,
        shift: &NewOperationalShift,
    ) -> Result<OperationalShift, ApiError> {
        self.post("/operativos", shift).await
    }

    async fn list_shift_vehicles(&self, shift_id: i64) -> Result<Vec<VehicleInShift>, ApiError> {
        self.list(&vehicles_path(shift_id)).await
    }

    async fn create_shift_vehicle(
        &self,
        shift_id: i64,
        vehicle: &NewVehicleInShift,
    ) -> Result<VehicleInShift, ApiError> {
        self.post(&vehicles_path(shift_id), vehicle).await
    }

    async fn delete_shift_vehicle(&self, shift_id: i64, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("{}/{id}", vehicles_path(shift_id)))
            .await
    }

    async fn list_quadrant_assignments(
        &self,
        shift_id: i64,
        vehicle_row_id: i64,
    ) -> Result<Vec<QuadrantAssignment>, ApiError> {
        self.list(&quadrants_path(shift_id, vehicle_row_id)).await
    }

    async fn create_quadrant_assignment(
        &self,
        shift_id: i64,
        vehicle_row_id: i64,
        assignment: &NewQuadrantAssignment,
    ) -> Result<QuadrantAssignment, ApiError> {
        self.post(&quadrants_path(shift_id, vehicle_row_id), assignment)
            .await
    }

    async fn delete_quadrant_assignment(
        &self,
        shift_id: i64,
        vehicle_row_id: i64,
        id: i64,
    ) -> Result<(), ApiError> {
        self.delete(&format!("{}/{id}", quadrants_path(shift_id, vehicle_row_id)))
            .await
    }

    async fn list_dispatch_links(
        &self,
        path: &AssignmentPath,
    ) -> Result<Vec<DispatchLink>, ApiError> {
        self.list(&path.links()).await
    }

    async fn create_dispatch_link(
        &self,
        path: &AssignmentPath,
        link: &DispatchLinkPayload,
    ) -> Result<DispatchLink, ApiError> {
        self.post(&path.links(), link).await
    }

    async fn update_dispatch_link(
        &self,
        path: &AssignmentPath,
        id: i64,
        link: &DispatchLinkPayload,
    ) -> Result<DispatchLink, ApiError> {
        self.put(&format!("{}/{id}", path.links()), link).await
    }

    async fn delete_dispatch_link(&self, path: &AssignmentPath, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("{}/{id}", path.links())).await
    }

    async fn update_incident(
        &self,
        id: i64,
        update: &IncidentDispatchUpdate,
    ) -> Result<Incident, ApiError> {
        self.put(&format!("/novedades/{id}"), update).await
    }
}
