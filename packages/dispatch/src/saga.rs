//! Compensation of partially completed dispatches.
//!
//! Each record a dispatch creates is written to a [`SagaLedger`]. If a
//! later step fails, [`SagaLedger::roll_back`] deletes those records newest
//! first. Operational shifts are shared by every dispatch for the same
//! date, slot and sector, so they are only listed as retained.
//!
//! Vehicle-in-shift rows and quadrant assignments are shared too: another
//! dispatch may have found and used them after this one created them. They
//! are deleted only while nothing else hangs off them (no quadrant
//! assignments under the vehicle, no dispatch links under the quadrant);
//! otherwise they are retained as well.

use std::fmt;

use citysecure_gateway::ApiError;
use serde::Serialize;
use strum_macros::{AsRefStr, Display};

use crate::backend::{AssignmentPath, DispatchBackend};

/// Kind of record touched by a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    #[strum(to_string = "operational shift")]
    OperationalShift,
    #[strum(to_string = "vehicle-in-shift")]
    VehicleInShift,
    #[strum(to_string = "quadrant assignment")]
    QuadrantAssignment,
    #[strum(to_string = "dispatch link")]
    DispatchLink,
}

/// A backend record by kind and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RecordRef {
    pub kind: RecordKind,
    pub id: i64,
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}

/// How to delete one created record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compensation {
    Vehicle {
        shift_id: i64,
        id: i64,
    },
    Quadrant {
        shift_id: i64,
        vehicle_row_id: i64,
        id: i64,
    },
    Link {
        path: AssignmentPath,
        id: i64,
    },
}

impl Compensation {
    const fn record(&self) -> RecordRef {
        match *self {
            Self::Vehicle { id, .. } => RecordRef {
                kind: RecordKind::VehicleInShift,
                id,
            },
            Self::Quadrant { id, .. } => RecordRef {
                kind: RecordKind::QuadrantAssignment,
                id,
            },
            Self::Link { id, .. } => RecordRef {
                kind: RecordKind::DispatchLink,
                id,
            },
        }
    }

    /// Number of records still attached below this one.
    async fn dependents(&self, backend: &dyn DispatchBackend) -> Result<usize, ApiError> {
        match *self {
            Self::Vehicle { shift_id, id } => Ok(backend
                .list_quadrant_assignments(shift_id, id)
                .await?
                .len()),
            Self::Quadrant {
                shift_id,
                vehicle_row_id,
                id,
            } => {
                let path = AssignmentPath {
                    shift_id,
                    vehicle_row_id,
                    quadrant_row_id: id,
                };
                Ok(backend.list_dispatch_links(&path).await?.len())
            }
            Self::Link { .. } => Ok(0),
        }
    }

    async fn undo(&self, backend: &dyn DispatchBackend) -> Result<Undo, ApiError> {
        let dependents = self.dependents(backend).await?;
        if dependents > 0 {
            return Ok(Undo::InUse(dependents));
        }

        match *self {
            Self::Vehicle { shift_id, id } => backend.delete_shift_vehicle(shift_id, id).await?,
            Self::Quadrant {
                shift_id,
                vehicle_row_id,
                id,
            } => {
                backend
                    .delete_quadrant_assignment(shift_id, vehicle_row_id, id)
                    .await?;
            }
            Self::Link { ref path, id } => backend.delete_dispatch_link(path, id).await?,
        }
        Ok(Undo::Deleted)
    }
}

enum Undo {
    Deleted,
    /// Kept because this many records still reference it.
    InUse(usize),
}

/// Records created so far by one dispatch.
#[derive(Debug, Default)]
pub struct SagaLedger {
    created: Vec<Compensation>,
    retained: Vec<RecordRef>,
}

impl SagaLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes a newly created operational shift. It is never deleted.
    pub fn shift_created(&mut self, id: i64) {
        self.retained.push(RecordRef {
            kind: RecordKind::OperationalShift,
            id,
        });
    }

    pub fn vehicle_created(&mut self, shift_id: i64, id: i64) {
        self.created.push(Compensation::Vehicle { shift_id, id });
    }

    pub fn quadrant_created(&mut self, shift_id: i64, vehicle_row_id: i64, id: i64) {
        self.created.push(Compensation::Quadrant {
            shift_id,
            vehicle_row_id,
            id,
        });
    }

    pub fn link_created(&mut self, path: AssignmentPath, id: i64) {
        self.created.push(Compensation::Link { path, id });
    }

    /// Deletes every created record that nothing else references, newest
    /// first. Individual failures are collected and do not stop the
    /// remaining deletions.
    pub async fn roll_back(self, backend: &dyn DispatchBackend) -> RollbackReport {
        let mut report = RollbackReport {
            retained: self.retained,
            ..RollbackReport::default()
        };

        for compensation in self.created.into_iter().rev() {
            let record = compensation.record();
            match compensation.undo(backend).await {
                Ok(Undo::Deleted) => {
                    log::warn!("Rolled back {record}");
                    report.undone.push(record);
                }
                Ok(Undo::InUse(dependents)) => {
                    log::warn!("Not rolling back {record}: {dependents} other record(s) use it");
                    report.retained.push(record);
                }
                Err(error) => {
                    log::error!("Failed to roll back {record}: {error}");
                    report.failed.push(FailedCompensation { record, error });
                }
            }
        }

        for record in &report.retained {
            log::info!("Keeping shared {record}");
        }

        report
    }
}

/// A record that could not be deleted during rollback.
#[derive(Debug)]
pub struct FailedCompensation {
    pub record: RecordRef,
    pub error: ApiError,
}

/// Result of undoing a failed dispatch.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Deleted records, in deletion order.
    pub undone: Vec<RecordRef>,
    /// Created records that were kept because they are shared.
    pub retained: Vec<RecordRef>,
    /// Records that are still on the backend because deletion failed.
    pub failed: Vec<FailedCompensation>,
}

impl RollbackReport {
    /// Whether every created record was deleted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rolled back [{}]", join(self.undone.iter()))?;
        if !self.retained.is_empty() {
            write!(f, "; kept [{}]", join(self.retained.iter()))?;
        }
        if !self.failed.is_empty() {
            let failed = self
                .failed
                .iter()
                .map(|c| format!("{}: {}", c.record, c.error));
            write!(f, "; could not delete [{}]", join(failed))?;
        }
        Ok(())
    }
}

fn join(items: impl Iterator<Item = impl fmt::Display>) -> String {
    items.map(|item| item.to_string()).collect::<Vec<_>>().join(", ")
}
