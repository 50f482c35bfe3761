//! In-memory backend for tests.
//!
//! Enforces the same uniqueness rules as the real backend (409 on a
//! duplicate create) and yields between reading and returning a listing,
//! so two concurrent find-or-create calls can both miss and race on create.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use citysecure_dispatch_models::{
    ActiveShift, DispatchLink, DispatchLinkPayload, Incident, IncidentDispatchUpdate,
    IncidentStatus, NewOperationalShift, NewQuadrantAssignment, NewVehicleInShift,
    OperationalShift, Priority, QuadrantAssignment, ShiftQuery, ShiftSlot, VehicleInShift,
};
use citysecure_gateway::{ApiError, ErrorEnvelope};

use crate::backend::{AssignmentPath, DispatchBackend};

pub enum ActiveScript {
    Slot(Option<ShiftSlot>),
    NotFound(serde_json::Value),
}

#[derive(Debug, Clone, Default)]
pub struct State {
    next_id: i64,
    pub shifts: Vec<OperationalShift>,
    pub vehicles: Vec<VehicleInShift>,
    pub quadrants: Vec<QuadrantAssignment>,
    pub links: Vec<DispatchLink>,
    pub incidents: BTreeMap<i64, Incident>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    active: Mutex<VecDeque<ActiveScript>>,
    deletions: Mutex<Vec<String>>,
    calls: AtomicUsize,
    active_calls: AtomicUsize,
    conflicts: AtomicUsize,
    pub fail_incident_update: AtomicBool,
    pub fail_quadrant_create: AtomicBool,
    pub fail_deletes: AtomicBool,
}

pub fn incident(id: i64, sector_id: Option<i64>, cuadrante_id: Option<i64>) -> Incident {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "novedad_code": format!("NOV-{id:06}"),
        "prioridad": "ALTA",
        "estado": "PENDIENTE",
        "sector_id": sector_id,
        "cuadrante_id": cuadrante_id,
    }))
    .unwrap()
}

fn conflict() -> ApiError {
    ApiError::Conflict {
        code: Some("DUPLICATE".to_string()),
        envelope: ErrorEnvelope::with_message("Record already exists"),
    }
}

fn server_error() -> ApiError {
    ApiError::Http {
        status: 500,
        envelope: ErrorEnvelope::with_message("Internal error"),
    }
}

impl FakeBackend {
    pub fn insert_incident(&self, incident: Incident) {
        self.state
            .lock()
            .unwrap()
            .incidents
            .insert(incident.id, incident);
    }

    pub fn script_active(&self, script: impl IntoIterator<Item = ActiveScript>) {
        self.active.lock().unwrap().extend(script);
    }

    pub fn snapshot(&self) -> State {
        self.state.lock().unwrap().clone()
    }

    pub fn deletions(&self) -> Vec<String> {
        self.deletions.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::SeqCst)
    }

    pub fn conflicts(&self) -> usize {
        self.conflicts.load(Ordering::SeqCst)
    }

    fn call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn conflict(&self) -> ApiError {
        self.conflicts.fetch_add(1, Ordering::SeqCst);
        conflict()
    }

    async fn listing<T>(&self, read: impl FnOnce(&State) -> Vec<T>) -> Result<Vec<T>, ApiError> {
        self.call();
        let rows = read(&self.state.lock().unwrap());
        tokio::task::yield_now().await;
        Ok(rows)
    }

    fn delete(&self, label: &str, id: i64, remove: impl FnOnce(&mut State)) -> Result<(), ApiError> {
        self.call();
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        remove(&mut self.state.lock().unwrap());
        self.deletions.lock().unwrap().push(format!("{label} {id}"));
        Ok(())
    }
}

#[async_trait]
impl DispatchBackend for FakeBackend {
    async fn active_shift(&self) -> Result<ActiveShift, ApiError> {
        self.call();
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.active.lock().unwrap().pop_front();
        match next {
            Some(ActiveScript::Slot(turno)) => Ok(ActiveShift {
                turno,
                hora_inicio: None,
                hora_fin: None,
            }),
            Some(ActiveScript::NotFound(data)) => Err(ApiError::NotFound {
                envelope: ErrorEnvelope {
                    message: Some("No hay turno activo".to_string()),
                    data: Some(data),
                    ..ErrorEnvelope::default()
                },
            }),
            None => Err(ApiError::NotFound {
                envelope: ErrorEnvelope::default(),
            }),
        }
    }

    async fn list_shifts(&self, query: &ShiftQuery) -> Result<Vec<OperationalShift>, ApiError> {
        self.listing(|s| {
            s.shifts
                .iter()
                .filter(|shift| shift.matches(query))
                .cloned()
                .collect()
        })
        .await
    }

    async fn create_shift(
        &self,
        shift: &NewOperationalShift,
    ) -> Result<OperationalShift, ApiError> {
        self.call();
        let mut state = self.state.lock().unwrap();
        let duplicate = state.shifts.iter().any(|s| {
            s.fecha == shift.fecha && s.turno == shift.turno && s.sector_id == shift.sector_id
        });
        if duplicate {
            drop(state);
            return Err(self.conflict());
        }
        let row = OperationalShift {
            id: state.next_id(),
            fecha: shift.fecha,
            turno: shift.turno,
            sector_id: shift.sector_id,
            operador_id: Some(shift.operador_id),
            supervisor_id: shift.supervisor_id,
        };
        state.shifts.push(row.clone());
        Ok(row)
    }

    async fn list_shift_vehicles(&self, shift_id: i64) -> Result<Vec<VehicleInShift>, ApiError> {
        self.listing(|s| {
            s.vehicles
                .iter()
                .filter(|v| v.operativo_turno_id == shift_id)
                .cloned()
                .collect()
        })
        .await
    }

    async fn create_shift_vehicle(
        &self,
        shift_id: i64,
        vehicle: &NewVehicleInShift,
    ) -> Result<VehicleInShift, ApiError> {
        self.call();
        let mut state = self.state.lock().unwrap();
        let duplicate = state
            .vehicles
            .iter()
            .any(|v| v.operativo_turno_id == shift_id && v.vehiculo_id == vehicle.vehiculo_id);
        if duplicate {
            drop(state);
            return Err(self.conflict());
        }
        let row = VehicleInShift {
            id: state.next_id(),
            operativo_turno_id: shift_id,
            vehiculo_id: vehicle.vehiculo_id,
            conductor_id: vehicle.conductor_id,
            copiloto_id: vehicle.copiloto_id,
            kilometraje_inicio: vehicle.kilometraje_inicio,
            kilometraje_fin: None,
            nivel_combustible_inicio: vehicle.nivel_combustible_inicio.clone(),
            nivel_combustible_fin: None,
            hora_inicio: Some(vehicle.hora_inicio),
            hora_fin: None,
        };
        state.vehicles.push(row.clone());
        Ok(row)
    }

    async fn delete_shift_vehicle(&self, _shift_id: i64, id: i64) -> Result<(), ApiError> {
        self.delete("vehicle", id, |s| s.vehicles.retain(|v| v.id != id))
    }

    async fn list_quadrant_assignments(
        &self,
        _shift_id: i64,
        vehicle_row_id: i64,
    ) -> Result<Vec<QuadrantAssignment>, ApiError> {
        self.listing(|s| {
            s.quadrants
                .iter()
                .filter(|q| q.operativo_vehiculo_id == vehicle_row_id)
                .cloned()
                .collect()
        })
        .await
    }

    async fn create_quadrant_assignment(
        &self,
        _shift_id: i64,
        vehicle_row_id: i64,
        assignment: &NewQuadrantAssignment,
    ) -> Result<QuadrantAssignment, ApiError> {
        self.call();
        if self.fail_quadrant_create.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let mut state = self.state.lock().unwrap();
        let duplicate = state.quadrants.iter().any(|q| {
            q.operativo_vehiculo_id == vehicle_row_id
                && q.cuadrante_id == assignment.cuadrante_id
                && q.is_active()
        });
        if duplicate {
            drop(state);
            return Err(self.conflict());
        }
        let row = QuadrantAssignment {
            id: state.next_id(),
            operativo_vehiculo_id: vehicle_row_id,
            cuadrante_id: assignment.cuadrante_id,
            hora_ingreso: Some(assignment.hora_ingreso),
            hora_salida: None,
            observaciones: assignment.observaciones.clone(),
        };
        state.quadrants.push(row.clone());
        Ok(row)
    }

    async fn delete_quadrant_assignment(
        &self,
        _shift_id: i64,
        _vehicle_row_id: i64,
        id: i64,
    ) -> Result<(), ApiError> {
        self.delete("quadrant", id, |s| s.quadrants.retain(|q| q.id != id))
    }

    async fn list_dispatch_links(
        &self,
        path: &AssignmentPath,
    ) -> Result<Vec<DispatchLink>, ApiError> {
        self.listing(|s| {
            s.links
                .iter()
                .filter(|l| l.operativo_vehiculo_cuadrante_id == path.quadrant_row_id)
                .cloned()
                .collect()
        })
        .await
    }

    async fn create_dispatch_link(
        &self,
        path: &AssignmentPath,
        link: &DispatchLinkPayload,
    ) -> Result<DispatchLink, ApiError> {
        self.call();
        let mut state = self.state.lock().unwrap();
        let duplicate = state.links.iter().any(|l| {
            l.operativo_vehiculo_cuadrante_id == path.quadrant_row_id
                && l.novedad_id == link.novedad_id
        });
        if duplicate {
            drop(state);
            return Err(self.conflict());
        }
        let row = DispatchLink {
            id: state.next_id(),
            operativo_vehiculo_cuadrante_id: path.quadrant_row_id,
            novedad_id: link.novedad_id,
            prioridad: link.prioridad,
            resultado: link.resultado,
            reportado: Some(link.reportado),
            observaciones: link.observaciones.clone(),
        };
        state.links.push(row.clone());
        Ok(row)
    }

    async fn update_dispatch_link(
        &self,
        _path: &AssignmentPath,
        id: i64,
        link: &DispatchLinkPayload,
    ) -> Result<DispatchLink, ApiError> {
        self.call();
        let mut state = self.state.lock().unwrap();
        let row = state
            .links
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| ApiError::NotFound {
                envelope: ErrorEnvelope::default(),
            })?;
        row.prioridad = link.prioridad;
        row.resultado = link.resultado;
        row.reportado = Some(link.reportado);
        row.observaciones.clone_from(&link.observaciones);
        Ok(row.clone())
    }

    async fn delete_dispatch_link(&self, _path: &AssignmentPath, id: i64) -> Result<(), ApiError> {
        self.delete("link", id, |s| s.links.retain(|l| l.id != id))
    }

    async fn update_incident(
        &self,
        id: i64,
        update: &IncidentDispatchUpdate,
    ) -> Result<Incident, ApiError> {
        self.call();
        if self.fail_incident_update.load(Ordering::SeqCst) {
            return Err(server_error());
        }
        let mut state = self.state.lock().unwrap();
        let incident = state
            .incidents
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound {
                envelope: ErrorEnvelope::default(),
            })?;
        incident.estado = update.estado;
        incident.fecha_despacho = Some(update.fecha_despacho);
        incident.unidad_oficina_id = update.unidad_oficina_id.or(incident.unidad_oficina_id);
        incident.vehiculo_id = update.vehiculo_id.or(incident.vehiculo_id);
        incident.personal_cargo_id = update.personal_cargo_id.or(incident.personal_cargo_id);
        Ok(incident.clone())
    }
}

#[test]
fn helper_incident_is_dispatchable() {
    let incident = incident(1, Some(3), None);
    assert_eq!(incident.prioridad, Priority::Alta);
    assert_eq!(incident.estado, IncidentStatus::Pendiente);
}
