//! Active work shift lookup.
//!
//! Shift boundaries are configured on the backend; the client never
//! computes them from its own clock. It only asks which shift is active and
//! remembers the last slot it was told, so a transient answer without a
//! slot does not block a dispatch.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use citysecure_dispatch_models::{ActiveShift, ShiftSlot, ShiftWindow};
use citysecure_gateway::ApiError;
use serde::Serialize;

use crate::DispatchError;
use crate::backend::DispatchBackend;

/// What the backend says about the current shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ShiftState {
    /// A shift is running. Its slot may still be missing.
    Active(ActiveShift),
    /// No shift covers the current time.
    NoActive {
        /// The configured shift windows, when the backend listed them.
        windows: Vec<ShiftWindow>,
    },
}

/// Resolves the active shift slot and caches the last one seen.
pub struct ShiftResolver {
    backend: Arc<dyn DispatchBackend>,
    retry_delay: Duration,
    last_slot: Mutex<Option<ShiftSlot>>,
}

impl ShiftResolver {
    #[must_use]
    pub fn new(backend: Arc<dyn DispatchBackend>, retry_delay: Duration) -> Self {
        Self {
            backend,
            retry_delay,
            last_slot: Mutex::new(None),
        }
    }

    /// Fetches the active shift.
    ///
    /// # Errors
    ///
    /// Returns the backend error for anything other than a 404, which is
    /// reported as [`ShiftState::NoActive`].
    pub async fn current(&self) -> Result<ShiftState, ApiError> {
        match self.backend.active_shift().await {
            Ok(shift) => {
                if let Some(slot) = shift.turno {
                    self.remember(slot);
                }
                Ok(ShiftState::Active(shift))
            }
            Err(ApiError::NotFound { envelope }) => {
                let windows = envelope.data.as_ref().map(parse_windows).unwrap_or_default();
                log::info!("No active shift ({} configured windows)", windows.len());
                Ok(ShiftState::NoActive { windows })
            }
            Err(e) => Err(e),
        }
    }

    /// The last slot any lookup returned.
    #[must_use]
    pub fn last_slot(&self) -> Option<ShiftSlot> {
        *self.last_slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks the slot to dispatch under.
    ///
    /// A slot in `provided` wins. Otherwise the active shift is fetched
    /// again once, after the retry delay, and if that still yields no slot
    /// the last cached slot is used.
    ///
    /// # Errors
    ///
    /// * [`DispatchError::NoActiveShift`] if no slot can be determined
    /// * [`DispatchError::ShiftLookup`] if the re-fetch failed and nothing
    ///   is cached
    pub async fn resolve_slot(
        &self,
        provided: Option<&ActiveShift>,
    ) -> Result<ShiftSlot, DispatchError> {
        if let Some(slot) = provided.and_then(|s| s.turno) {
            self.remember(slot);
            return Ok(slot);
        }

        log::warn!(
            "Active shift has no slot; retrying in {}ms",
            self.retry_delay.as_millis()
        );
        tokio::time::sleep(self.retry_delay).await;

        let windows = match self.current().await {
            Ok(ShiftState::Active(ActiveShift {
                turno: Some(slot), ..
            })) => return Ok(slot),
            Ok(ShiftState::Active(_)) => Vec::new(),
            Ok(ShiftState::NoActive { windows }) => windows,
            Err(e) => {
                return self.last_slot().map_or(Err(DispatchError::ShiftLookup(e)), |slot| {
                    log::warn!("Active shift lookup failed; using last known slot {slot}");
                    Ok(slot)
                });
            }
        };

        self.last_slot().map_or_else(
            || Err(DispatchError::NoActiveShift { windows }),
            |slot| {
                log::warn!("Falling back to last known shift slot {slot}");
                Ok(slot)
            },
        )
    }

    fn remember(&self, slot: ShiftSlot) {
        *self.last_slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(slot);
    }
}

/// Reads shift windows from a 404 body's `data`: either the list itself or
/// an object holding it under `horarios` or `turnos`. Malformed entries are
/// skipped.
fn parse_windows(data: &serde_json::Value) -> Vec<ShiftWindow> {
    let items = data.as_array().or_else(|| {
        ["horarios", "turnos"]
            .iter()
            .find_map(|key| data.get(key).and_then(serde_json::Value::as_array))
    });

    items
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{ActiveScript, FakeBackend};

    const DELAY: Duration = Duration::from_millis(1500);

    fn resolver(backend: &Arc<FakeBackend>) -> ShiftResolver {
        ShiftResolver::new(backend.clone(), DELAY)
    }

    #[tokio::test]
    async fn active_shift_is_cached() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_active([ActiveScript::Slot(Some(ShiftSlot::Noche))]);
        let shifts = resolver(&backend);

        let state = shifts.current().await.unwrap();
        assert!(matches!(state, ShiftState::Active(ActiveShift { turno: Some(ShiftSlot::Noche), .. })));
        assert_eq!(shifts.last_slot(), Some(ShiftSlot::Noche));
    }

    #[tokio::test]
    async fn not_found_lists_windows() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_active([ActiveScript::NotFound(serde_json::json!({
            "horarios": [
                { "turno": "MAÑANA", "hora_inicio": "06:00", "hora_fin": "14:00" },
                { "turno": "TARDE", "hora_inicio": "14:00", "hora_fin": "22:00" },
                { "bogus": true }
            ]
        }))]);

        let state = resolver(&backend).current().await.unwrap();
        let ShiftState::NoActive { windows } = state else {
            panic!("expected no active shift, got {state:?}");
        };
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].turno, ShiftSlot::Manana);
    }

    #[tokio::test]
    async fn provided_slot_skips_the_backend() {
        let backend = Arc::new(FakeBackend::default());
        let shifts = resolver(&backend);

        let slot = shifts
            .resolve_slot(Some(&ActiveShift::from_slot(ShiftSlot::Tarde)))
            .await
            .unwrap();
        assert_eq!(slot, ShiftSlot::Tarde);
        assert_eq!(backend.active_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_slot_is_fetched_again_after_delay() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_active([ActiveScript::Slot(Some(ShiftSlot::Manana))]);
        let shifts = resolver(&backend);

        let started = tokio::time::Instant::now();
        let slot = shifts
            .resolve_slot(Some(&ActiveShift {
                turno: None,
                hora_inicio: None,
                hora_fin: None,
            }))
            .await
            .unwrap();

        assert_eq!(slot, ShiftSlot::Manana);
        assert!(started.elapsed() >= DELAY);
        assert_eq!(backend.active_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_cached_slot() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_active([
            ActiveScript::Slot(Some(ShiftSlot::Tarde)),
            ActiveScript::Slot(None),
        ]);
        let shifts = resolver(&backend);
        shifts.current().await.unwrap();

        let slot = shifts.resolve_slot(None).await.unwrap();
        assert_eq!(slot, ShiftSlot::Tarde);
    }

    #[tokio::test(start_paused = true)]
    async fn no_slot_and_nothing_cached_is_an_error() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_active([ActiveScript::NotFound(serde_json::json!([
            { "turno": "NOCHE", "hora_inicio": "22:00", "hora_fin": "06:00" }
        ]))]);

        let err = resolver(&backend).resolve_slot(None).await.unwrap_err();
        match err {
            DispatchError::NoActiveShift { windows } => assert_eq!(windows.len(), 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
