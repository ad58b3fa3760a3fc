use crate::api::models::{Detection, Lot};
use crate::availability::{Availability, AvailabilityInputs, reconcile};
use std::time::SystemTime;
use tokio::sync::watch;

/// What the detector last reported for a lot, minus the raw zone payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSnapshot {
    pub available: Option<u32>,
    pub image_annotated: Option<String>,
    pub zone_count: usize,
    pub occupancy_rate: Option<f64>,
}

impl From<&Detection> for DetectionSnapshot {
    fn from(detection: &Detection) -> Self {
        Self {
            available: detection
                .available
                .or_else(|| detection.statistics.as_ref().and_then(|s| s.available)),
            image_annotated: detection.image_annotated.clone(),
            zone_count: detection.zone_count(),
            occupancy_rate: detection
                .occupancy_rate
                .or_else(|| detection.statistics.as_ref().and_then(|s| s.occupancy_rate)),
        }
    }
}

/// Everything a lot detail view renders.
#[derive(Debug, Clone, PartialEq)]
pub struct LotView {
    pub lot: Lot,
    pub detection: Option<DetectionSnapshot>,
    pub active_reservations: u32,
    pub availability: Availability,
    /// Inline banner shown when the detector could not be reached.
    pub detection_error: Option<String>,
    pub loading: bool,
    pub updated_at: Option<SystemTime>,
}

impl LotView {
    fn initial(lot: Lot) -> Self {
        let availability = reconcile(&AvailabilityInputs::for_lot(&lot, None, 0));
        Self {
            lot,
            detection: None,
            active_reservations: 0,
            availability,
            detection_error: None,
            loading: false,
            updated_at: None,
        }
    }

    pub fn detected_free(&self) -> Option<u32> {
        self.detection.as_ref().and_then(|d| d.available)
    }
}

/// Raw results of one refresh cycle; `Err` carries the user-facing message.
#[derive(Debug, Clone)]
pub struct RefreshResults {
    pub detection: Result<Detection, String>,
    pub active_reservations: Result<u32, String>,
}

#[derive(Debug)]
pub struct LotViewState {
    view: LotView,
    view_tx: watch::Sender<LotView>,
}

impl LotViewState {
    pub fn new(lot: Lot) -> Self {
        let view = LotView::initial(lot);
        let (view_tx, _view_rx) = watch::channel(view.clone());
        Self { view, view_tx }
    }

    pub fn view(&self) -> &LotView {
        &self.view
    }

    pub fn subscribe(&self) -> watch::Receiver<LotView> {
        self.view_tx.subscribe()
    }

    pub fn begin_refresh(&mut self) {
        self.view.loading = true;
        self.publish();
    }

    /// Replaces the lot record (e.g. after the owner edits its free count).
    pub fn set_lot(&mut self, lot: Lot) -> Availability {
        self.view.lot = lot;
        self.recompute()
    }

    /// Folds one refresh cycle into the view. A failed fetch leaves its input
    /// at the prior value; only a detection failure raises a banner.
    pub fn apply_refresh(&mut self, results: RefreshResults, at: SystemTime) -> Availability {
        match results.detection {
            Ok(detection) => {
                let mut snapshot = DetectionSnapshot::from(&detection);
                if snapshot.available.is_none() {
                    snapshot.available = self.view.detected_free();
                }
                self.view.detection = Some(snapshot);
                self.view.detection_error = None;
            }
            Err(message) => {
                self.view.detection_error = Some(message);
            }
        }
        if let Ok(count) = results.active_reservations {
            self.view.active_reservations = count;
        }
        self.view.loading = false;
        self.view.updated_at = Some(at);
        self.recompute()
    }

    pub fn finish_without_update(&mut self) {
        if self.view.loading {
            self.view.loading = false;
            self.publish();
        }
    }

    fn recompute(&mut self) -> Availability {
        let inputs = AvailabilityInputs::for_lot(
            &self.view.lot,
            self.view.detected_free(),
            self.view.active_reservations,
        );
        self.view.availability = reconcile(&inputs);
        self.publish();
        self.view.availability
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn lot() -> Lot {
        Lot {
            id: 1,
            nombre: "Centro".to_string(),
            direccion: "Av. Principal #123".to_string(),
            horario: "24 horas".to_string(),
            precio: 25.0,
            espacios_total: 100,
            espacios_disponibles: 40,
            duenio_id: Some(7),
            fecha_creacion: None,
            activo: Some(true),
        }
    }

    fn detection(available: u32) -> Detection {
        Detection {
            available: Some(available),
            ..Detection::default()
        }
    }

    #[test]
    fn initial_view_uses_backend_count() {
        let state = LotViewState::new(lot());
        assert_eq!(state.view().availability.free, 40);
        assert_eq!(state.view().availability.reservable_now, 40);
        assert!(!state.view().loading);
    }

    #[test]
    fn apply_refresh_updates_state_and_watch() {
        let mut state = LotViewState::new(lot());
        let receiver = state.subscribe();
        state.begin_refresh();
        assert!(receiver.borrow().loading);

        let availability = state.apply_refresh(
            RefreshResults {
                detection: Ok(detection(45)),
                active_reservations: Ok(10),
            },
            UNIX_EPOCH + Duration::from_secs(5),
        );

        assert_eq!(availability.reservable_now, 35);
        assert_eq!(receiver.borrow().availability, availability);
        assert!(!receiver.borrow().loading);
        assert_eq!(
            receiver.borrow().updated_at,
            Some(UNIX_EPOCH + Duration::from_secs(5))
        );
    }

    #[test]
    fn failed_detection_keeps_prior_value_and_sets_banner() {
        let mut state = LotViewState::new(lot());
        state.apply_refresh(
            RefreshResults {
                detection: Ok(detection(30)),
                active_reservations: Ok(5),
            },
            UNIX_EPOCH,
        );

        let availability = state.apply_refresh(
            RefreshResults {
                detection: Err("connection refused".to_string()),
                active_reservations: Ok(8),
            },
            UNIX_EPOCH,
        );

        assert_eq!(availability.free, 30);
        assert_eq!(availability.reservable_now, 22);
        assert_eq!(
            state.view().detection_error.as_deref(),
            Some("connection refused")
        );
    }

    #[test]
    fn failed_reservation_count_keeps_last_known_without_banner() {
        let mut state = LotViewState::new(lot());
        state.apply_refresh(
            RefreshResults {
                detection: Ok(detection(20)),
                active_reservations: Ok(6),
            },
            UNIX_EPOCH,
        );

        let availability = state.apply_refresh(
            RefreshResults {
                detection: Ok(detection(20)),
                active_reservations: Err("HTTP 500".to_string()),
            },
            UNIX_EPOCH,
        );

        assert_eq!(availability.active_reservations, 6);
        assert_eq!(availability.reservable_now, 14);
        assert!(state.view().detection_error.is_none());
    }

    #[test]
    fn set_lot_recomputes_fallback() {
        let mut state = LotViewState::new(lot());
        let mut edited = lot();
        edited.espacios_disponibles = 12;
        let availability = state.set_lot(edited);
        assert_eq!(availability.free, 12);
    }
}
