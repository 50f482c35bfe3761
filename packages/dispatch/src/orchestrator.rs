//! The dispatch chain.
//!
//! [`Dispatcher::dispatch_incident`] validates the request, resolves the
//! shift slot, then runs the find-or-create steps in order. Each step needs
//! the id produced by the previous one, so nothing runs concurrently.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use citysecure_config::DispatchConfig;
use citysecure_dispatch_models::{
    ActiveShift, DispatchLink, DispatchLinkPayload, DispatchOutcome, Incident,
    IncidentDispatchUpdate, IncidentStatus, NewOperationalShift, NewQuadrantAssignment,
    NewVehicleInShift, OperationalShift, QuadrantAssignment, ShiftQuery, ShiftSlot,
    VehicleInShift,
};
use citysecure_gateway::ApiError;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::backend::{AssignmentPath, DispatchBackend};
use crate::clock::{Clock, SystemClock, local_date};
use crate::saga::{RecordKind, SagaLedger};
use crate::shift::ShiftResolver;
use crate::{DispatchError, DispatchStep};

/// A record that was either already there or created by this call.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
    Found(T),
    Created(T),
}

impl<T> Resolved<T> {
    #[must_use]
    pub const fn record(&self) -> &T {
        match self {
            Self::Found(record) | Self::Created(record) => record,
        }
    }

    #[must_use]
    pub const fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    const fn action(&self) -> RecordAction {
        match self {
            Self::Found(_) => RecordAction::Found,
            Self::Created(_) => RecordAction::Created,
        }
    }
}

/// What a dispatch did with one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordAction {
    Found,
    Created,
    Updated,
}

/// One record touched by a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordOutcome {
    pub kind: RecordKind,
    pub id: i64,
    pub action: RecordAction,
}

/// Operator choices made in the dispatch form. Everything is optional; a
/// dispatch without a vehicle only updates the incident.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchSelections {
    pub vehiculo_id: Option<i64>,
    pub conductor_id: Option<i64>,
    pub copiloto_id: Option<i64>,
    pub personal_cargo_id: Option<i64>,
    pub unidad_oficina_id: Option<i64>,
    pub kilometraje_inicio: Option<f64>,
    pub nivel_combustible: Option<String>,
    pub observaciones: Option<String>,
}

/// Input of [`Dispatcher::dispatch_incident`].
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub incident: Incident,
    pub selections: DispatchSelections,
    /// Active shift as last shown to the operator. `None`, or a shift
    /// without a slot, makes the dispatcher ask the backend again.
    pub active_shift: Option<ActiveShift>,
    /// Recorded as `operador_id` on a newly created operational shift.
    pub operator_id: Option<i64>,
}

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// The incident as returned by the final update.
    pub incident: Incident,
    /// Local date the operational shift was keyed on.
    pub fecha: NaiveDate,
    pub turno: ShiftSlot,
    /// Records in chain order.
    pub records: Vec<RecordOutcome>,
    /// Steps that were skipped and why.
    pub warnings: Vec<String>,
}

impl DispatchReport {
    /// Records that this dispatch created.
    pub fn created(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.records
            .iter()
            .filter(|r| r.action == RecordAction::Created)
    }

    /// Records that already existed (including updated links).
    pub fn found(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.records
            .iter()
            .filter(|r| r.action != RecordAction::Created)
    }

    #[must_use]
    pub fn record(&self, kind: RecordKind) -> Option<&RecordOutcome> {
        self.records.iter().find(|r| r.kind == kind)
    }
}

/// Everything a dispatch run needs once validation passed.
struct Plan<'a> {
    incident: &'a Incident,
    selections: &'a DispatchSelections,
    key: ShiftQuery,
    operator_id: i64,
    now: DateTime<Utc>,
}

type StepFailure = (DispatchStep, ApiError);

fn failed_at(step: DispatchStep) -> impl FnOnce(ApiError) -> StepFailure {
    move |error| (step, error)
}

/// Runs the dispatch chain against a [`DispatchBackend`].
pub struct Dispatcher {
    backend: Arc<dyn DispatchBackend>,
    shifts: ShiftResolver,
    clock: Arc<dyn Clock>,
}

impl Dispatcher {
    /// Creates a dispatcher using the system clock.
    #[must_use]
    pub fn new(backend: Arc<dyn DispatchBackend>, config: &DispatchConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        backend: Arc<dyn DispatchBackend>,
        config: &DispatchConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            shifts: ShiftResolver::new(backend.clone(), config.shift_retry_delay()),
            backend,
            clock,
        }
    }

    /// The shift resolver, whose slot cache persists across dispatches.
    #[must_use]
    pub const fn shifts(&self) -> &ShiftResolver {
        &self.shifts
    }

    /// Dispatches an incident.
    ///
    /// # Errors
    ///
    /// * [`DispatchError::NotDispatchable`] if the incident is attended,
    ///   closed or deleted
    /// * [`DispatchError::MissingSector`] if the incident has no sector
    /// * [`DispatchError::MissingOperator`] if no operator id was given
    /// * [`DispatchError::NoActiveShift`] / [`DispatchError::ShiftLookup`]
    ///   if no shift slot can be resolved
    /// * [`DispatchError::StepFailed`] if a backend step fails; records
    ///   created earlier in the same call have been rolled back
    pub async fn dispatch_incident(
        &self,
        request: DispatchRequest,
    ) -> Result<DispatchReport, DispatchError> {
        let DispatchRequest {
            incident,
            selections,
            active_shift,
            operator_id,
        } = request;

        if incident.is_deleted() {
            return Err(DispatchError::NotDispatchable {
                incident_id: incident.id,
                reason: "deleted".to_string(),
            });
        }
        if !incident.estado.can_dispatch() {
            return Err(DispatchError::not_dispatchable(incident.id, incident.estado));
        }
        let sector_id = incident.sector_id.ok_or(DispatchError::MissingSector {
            incident_id: incident.id,
        })?;
        let operator_id = operator_id.ok_or(DispatchError::MissingOperator)?;

        let turno = self.shifts.resolve_slot(active_shift.as_ref()).await?;
        let now = self.clock.now();
        let plan = Plan {
            incident: &incident,
            selections: &selections,
            key: ShiftQuery {
                fecha: local_date(&now),
                turno,
                sector_id,
            },
            operator_id,
            now: now.with_timezone(&Utc),
        };

        log::info!(
            "Dispatching incident {} (sector {sector_id}, {turno} shift of {})",
            incident.id,
            plan.key.fecha
        );

        let mut ledger = SagaLedger::new();
        match self.run(&plan, &mut ledger).await {
            Ok(report) => {
                log::info!(
                    "Incident {} dispatched ({} records created)",
                    incident.id,
                    report.created().count()
                );
                Ok(report)
            }
            Err((step, source)) => {
                log::error!("Dispatch of incident {} failed at {step}: {source}", incident.id);
                let rollback = ledger.roll_back(self.backend.as_ref()).await;
                Err(DispatchError::StepFailed {
                    step,
                    source,
                    rollback,
                })
            }
        }
    }

    async fn run(
        &self,
        plan: &Plan<'_>,
        ledger: &mut SagaLedger,
    ) -> Result<DispatchReport, StepFailure> {
        let Plan {
            incident,
            selections,
            key,
            operator_id,
            now,
        } = *plan;
        let mut records = Vec::with_capacity(4);
        let mut warnings = Vec::new();

        let shift = self
            .find_or_create_shift(key, operator_id)
            .await
            .map_err(failed_at(DispatchStep::OperationalShift))?;
        let shift_id = shift.record().id;
        if shift.was_created() {
            ledger.shift_created(shift_id);
        }
        records.push(RecordOutcome {
            kind: RecordKind::OperationalShift,
            id: shift_id,
            action: shift.action(),
        });

        if let Some(vehiculo_id) = selections.vehiculo_id {
            let vehicle = self
                .find_or_create_vehicle(
                    shift_id,
                    &NewVehicleInShift {
                        vehiculo_id,
                        conductor_id: selections.conductor_id,
                        copiloto_id: selections.copiloto_id,
                        kilometraje_inicio: selections.kilometraje_inicio,
                        nivel_combustible_inicio: selections.nivel_combustible.clone(),
                        hora_inicio: now,
                    },
                )
                .await
                .map_err(failed_at(DispatchStep::VehicleInShift))?;
            let vehicle_row_id = vehicle.record().id;
            if vehicle.was_created() {
                ledger.vehicle_created(shift_id, vehicle_row_id);
            }
            records.push(RecordOutcome {
                kind: RecordKind::VehicleInShift,
                id: vehicle_row_id,
                action: vehicle.action(),
            });

            if let Some(cuadrante_id) = incident.cuadrante_id {
                let quadrant = self
                    .find_or_create_quadrant(
                        shift_id,
                        vehicle_row_id,
                        &NewQuadrantAssignment {
                            cuadrante_id,
                            hora_ingreso: now,
                            observaciones: selections.observaciones.clone(),
                        },
                    )
                    .await
                    .map_err(failed_at(DispatchStep::QuadrantAssignment))?;
                let path = AssignmentPath {
                    shift_id,
                    vehicle_row_id,
                    quadrant_row_id: quadrant.record().id,
                };
                if quadrant.was_created() {
                    ledger.quadrant_created(shift_id, vehicle_row_id, path.quadrant_row_id);
                }
                records.push(RecordOutcome {
                    kind: RecordKind::QuadrantAssignment,
                    id: path.quadrant_row_id,
                    action: quadrant.action(),
                });

                let (link, action) = self
                    .upsert_link(
                        &path,
                        &DispatchLinkPayload {
                            novedad_id: incident.id,
                            prioridad: incident.prioridad,
                            resultado: DispatchOutcome::Pendiente,
                            reportado: now,
                            observaciones: selections.observaciones.clone(),
                        },
                    )
                    .await
                    .map_err(failed_at(DispatchStep::DispatchLink))?;
                if action == RecordAction::Created {
                    ledger.link_created(path, link.id);
                }
                records.push(RecordOutcome {
                    kind: RecordKind::DispatchLink,
                    id: link.id,
                    action,
                });
            } else {
                let warning = format!(
                    "Incident {} has no quadrant; quadrant assignment and dispatch link skipped",
                    incident.id
                );
                log::warn!("{warning}");
                warnings.push(warning);
            }
        } else {
            log::debug!("No vehicle selected for incident {}", incident.id);
        }

        let updated = self
            .backend
            .update_incident(
                incident.id,
                &IncidentDispatchUpdate {
                    estado: IncidentStatus::Despachado,
                    fecha_despacho: now,
                    unidad_oficina_id: selections.unidad_oficina_id,
                    vehiculo_id: selections.vehiculo_id,
                    personal_cargo_id: selections.personal_cargo_id,
                    observaciones: selections.observaciones.clone(),
                },
            )
            .await
            .map_err(failed_at(DispatchStep::IncidentUpdate))?;

        Ok(DispatchReport {
            incident: updated,
            fecha: key.fecha,
            turno: key.turno,
            records,
            warnings,
        })
    }

    /// Finds the operational shift for `key`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the lookup or the create.
    pub async fn find_or_create_shift(
        &self,
        key: ShiftQuery,
        operator_id: i64,
    ) -> Result<Resolved<OperationalShift>, ApiError> {
        let backend = self.backend.as_ref();
        let key = &key;

        find_or_create(
            RecordKind::OperationalShift,
            move || async move {
                let shifts = backend.list_shifts(key).await?;
                Ok::<_, ApiError>(shifts.into_iter().find(|s| s.matches(key)))
            },
            move || async move {
                let shift = NewOperationalShift {
                    fecha: key.fecha,
                    turno: key.turno,
                    sector_id: key.sector_id,
                    operador_id: operator_id,
                    supervisor_id: None,
                };
                backend.create_shift(&shift).await
            },
        )
        .await
    }

    /// Finds the row for `vehicle.vehiculo_id` in the shift, creating it if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the lookup or the create.
    pub async fn find_or_create_vehicle(
        &self,
        shift_id: i64,
        vehicle: &NewVehicleInShift,
    ) -> Result<Resolved<VehicleInShift>, ApiError> {
        let backend = self.backend.as_ref();

        find_or_create(
            RecordKind::VehicleInShift,
            move || async move {
                let rows = backend.list_shift_vehicles(shift_id).await?;
                Ok::<_, ApiError>(
                    rows.into_iter()
                        .find(|v| v.vehiculo_id == vehicle.vehiculo_id),
                )
            },
            move || async move { backend.create_shift_vehicle(shift_id, vehicle).await },
        )
        .await
    }

    /// Finds the vehicle's active assignment to `assignment.cuadrante_id`,
    /// creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the lookup or the create.
    pub async fn find_or_create_quadrant(
        &self,
        shift_id: i64,
        vehicle_row_id: i64,
        assignment: &NewQuadrantAssignment,
    ) -> Result<Resolved<QuadrantAssignment>, ApiError> {
        let backend = self.backend.as_ref();

        find_or_create(
            RecordKind::QuadrantAssignment,
            move || async move {
                let rows = backend
                    .list_quadrant_assignments(shift_id, vehicle_row_id)
                    .await?;
                Ok::<_, ApiError>(
                    rows.into_iter()
                        .find(|a| a.cuadrante_id == assignment.cuadrante_id && a.is_active()),
                )
            },
            move || async move {
                backend
                    .create_quadrant_assignment(shift_id, vehicle_row_id, assignment)
                    .await
            },
        )
        .await
    }

    /// Links the incident to the assignment, or updates the existing link.
    /// An existing link keeps its recorded outcome.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the lookup, create or update.
    pub async fn upsert_link(
        &self,
        path: &AssignmentPath,
        link: &DispatchLinkPayload,
    ) -> Result<(DispatchLink, RecordAction), ApiError> {
        let backend = self.backend.as_ref();

        let resolved = find_or_create(
            RecordKind::DispatchLink,
            move || async move {
                let links = backend.list_dispatch_links(path).await?;
                Ok::<_, ApiError>(links.into_iter().find(|l| l.novedad_id == link.novedad_id))
            },
            move || async move { backend.create_dispatch_link(path, link).await },
        )
        .await?;

        match resolved {
            Resolved::Created(created) => Ok((created, RecordAction::Created)),
            Resolved::Found(existing) => {
                let payload = DispatchLinkPayload {
                    resultado: existing.resultado,
                    ..link.clone()
                };
                let updated = backend
                    .update_dispatch_link(path, existing.id, &payload)
                    .await?;
                Ok((updated, RecordAction::Updated))
            }
        }
    }
}

/// Looks the record up, creates it when absent, and on a 409 looks it up
/// once more.
async fn find_or_create<T, Find, FindFut, Create, CreateFut>(
    kind: RecordKind,
    find: Find,
    create: Create,
) -> Result<Resolved<T>, ApiError>
where
    Find: Fn() -> FindFut,
    FindFut: Future<Output = Result<Option<T>, ApiError>>,
    Create: FnOnce() -> CreateFut,
    CreateFut: Future<Output = Result<T, ApiError>>,
{
    if let Some(existing) = find().await? {
        log::debug!("Reusing existing {kind}");
        return Ok(Resolved::Found(existing));
    }

    match create().await {
        Ok(created) => {
            log::debug!("Created {kind}");
            Ok(Resolved::Created(created))
        }
        Err(e) if e.is_conflict() => {
            log::warn!("{kind} was created concurrently; fetching the existing record");
            find().await?.map(Resolved::Found).ok_or(e)
        }
        Err(e) => Err(e),
    }
}
