//! Keeps one lot's view state in step with the detector and the reservation
//! count.
//!
//! Each [`LotMonitor::refresh`] takes a generation ticket before it starts its
//! two fetches. When they finish, the results are applied only if the ticket is
//! still the newest and the monitor is still open, so a slow response can never
//! overwrite a fresher one. Locks are never held across an `.await`.

use crate::api::ApiClient;
use crate::api::models::{Detection, Lot, LotId};
use crate::availability::{Availability, AvailabilityInputs, reconcile};
use crate::error::ClientError;
use crate::state::{LotView, LotViewState, RefreshResults};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// The two per-lot lookups a refresh needs.
pub trait AvailabilitySource: Send + Sync {
    fn detect(&self, lot_id: LotId) -> impl Future<Output = Result<Detection, ClientError>> + Send;

    fn active_reservations(
        &self,
        lot_id: LotId,
    ) -> impl Future<Output = Result<u32, ClientError>> + Send;
}

impl AvailabilitySource for ApiClient {
    async fn detect(&self, lot_id: LotId) -> Result<Detection, ClientError> {
        ApiClient::detect(self, lot_id).await
    }

    async fn active_reservations(&self, lot_id: LotId) -> Result<u32, ClientError> {
        ApiClient::active_reservations(self, lot_id).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied(Availability),
    /// A newer refresh started, or the monitor was closed, before this one finished.
    Superseded,
}

pub struct LotMonitor<S> {
    source: Arc<S>,
    lot_id: LotId,
    state: RwLock<LotViewState>,
    generation: AtomicU64,
    closed: AtomicBool,
}

impl<S> std::fmt::Debug for LotMonitor<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotMonitor")
            .field("lot_id", &self.lot_id)
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl<S: AvailabilitySource> LotMonitor<S> {
    pub fn new(source: Arc<S>, lot: Lot) -> Self {
        Self {
            source,
            lot_id: lot.id,
            state: RwLock::new(LotViewState::new(lot)),
            generation: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn view(&self) -> Result<LotView, ClientError> {
        let guard = self.state.read().map_err(|_| ClientError::StateLock)?;
        Ok(guard.view().clone())
    }

    pub fn subscribe(&self) -> Result<watch::Receiver<LotView>, ClientError> {
        let guard = self.state.read().map_err(|_| ClientError::StateLock)?;
        Ok(guard.subscribe())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Invalidates every refresh still in flight.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.state.write() {
            guard.finish_without_update();
        }
        debug!(lot_id = self.lot_id, "Monitor closed");
    }

    /// Replaces the lot record, e.g. after the owner edits its free count.
    pub fn set_lot(&self, lot: Lot) -> Result<Availability, ClientError> {
        let mut guard = self.state.write().map_err(|_| ClientError::StateLock)?;
        Ok(guard.set_lot(lot))
    }

    /// Runs both fetches concurrently and folds them into the view.
    ///
    /// Only a session expiry is returned as an error; every other failure is
    /// absorbed into the view state.
    pub async fn refresh(&self) -> Result<RefreshOutcome, ClientError> {
        if self.is_closed() {
            return Ok(RefreshOutcome::Superseded);
        }
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut guard = self.state.write().map_err(|_| ClientError::StateLock)?;
            guard.begin_refresh();
        }

        let (detection, active) = tokio::join!(
            self.source.detect(self.lot_id),
            self.source.active_reservations(self.lot_id)
        );

        if matches!(detection, Err(ClientError::SessionExpired))
            || matches!(active, Err(ClientError::SessionExpired))
        {
            self.close();
            return Err(ClientError::SessionExpired);
        }

        let results = RefreshResults {
            detection: detection.map_err(|err| {
                warn!(lot_id = self.lot_id, error = %err, "Detection unavailable");
                err.to_string()
            }),
            active_reservations: active.map_err(|err| {
                warn!(lot_id = self.lot_id, error = %err, "Active reservation count unavailable");
                err.to_string()
            }),
        };

        let mut guard = self.state.write().map_err(|_| ClientError::StateLock)?;
        if self.is_closed() || self.generation.load(Ordering::SeqCst) != ticket {
            debug!(lot_id = self.lot_id, ticket, "Discarding superseded refresh");
            return Ok(RefreshOutcome::Superseded);
        }
        let availability = guard.apply_refresh(results, SystemTime::now());
        debug!(
            lot_id = self.lot_id,
            reservable_now = availability.reservable_now,
            occupancy_percent = availability.occupancy_percent,
            "Availability refreshed"
        );
        Ok(RefreshOutcome::Applied(availability))
    }
}

/// Refreshes `monitor` every `interval` until `stop` is set, the monitor is
/// closed, or the session expires.
pub fn spawn_periodic_refresh<S>(
    monitor: Arc<LotMonitor<S>>,
    interval: Duration,
    stop: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    S: AvailabilitySource + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            lot_id = monitor.lot_id(),
            interval_secs = interval.as_secs(),
            "Periodic refresh started"
        );

        loop {
            ticker.tick().await;
            if stop.load(Ordering::Relaxed) || monitor.is_closed() {
                break;
            }
            match monitor.refresh().await {
                Ok(_) => {}
                Err(ClientError::SessionExpired) => {
                    warn!(lot_id = monitor.lot_id(), "Session expired, stopping refresh");
                    break;
                }
                Err(err) => warn!(lot_id = monitor.lot_id(), error = %err, "Refresh failed"),
            }
        }
        debug!(lot_id = monitor.lot_id(), "Periodic refresh stopped");
    })
}

/// One lot of an owner's fleet after a refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct LotAvailability {
    pub lot: Lot,
    pub availability: Availability,
    pub detection_error: Option<String>,
}

/// Refreshes every lot concurrently. A lot whose fetches fail falls back to
/// its stored free count; only a session expiry fails the whole call.
pub async fn refresh_fleet<S>(
    source: Arc<S>,
    lots: &[Lot],
) -> Result<Vec<LotAvailability>, ClientError>
where
    S: AvailabilitySource + 'static,
{
    let mut results: Vec<LotAvailability> = lots
        .iter()
        .map(|lot| LotAvailability {
            lot: lot.clone(),
            availability: reconcile(&AvailabilityInputs::for_lot(lot, None, 0)),
            detection_error: None,
        })
        .collect();

    let mut tasks = JoinSet::new();
    for (index, lot) in lots.iter().enumerate() {
        let source = Arc::clone(&source);
        let lot_id = lot.id;
        tasks.spawn(async move {
            let (detection, active) =
                tokio::join!(source.detect(lot_id), source.active_reservations(lot_id));
            (index, detection, active)
        });
    }

    let mut expired = false;
    while let Some(joined) = tasks.join_next().await {
        let (index, detection, active) = match joined {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "Fleet refresh task failed");
                continue;
            }
        };
        if matches!(detection, Err(ClientError::SessionExpired))
            || matches!(active, Err(ClientError::SessionExpired))
        {
            expired = true;
            continue;
        }
        let entry = &mut results[index];
        let (detected_free, detection_error) = match detection {
            Ok(detection) => (
                detection
                    .available
                    .or_else(|| detection.statistics.and_then(|s| s.available)),
                None,
            ),
            Err(err) => {
                warn!(lot_id = entry.lot.id, error = %err, "Detection unavailable");
                (None, Some(err.to_string()))
            }
        };
        let active = active.unwrap_or_else(|err| {
            warn!(lot_id = entry.lot.id, error = %err, "Active reservation count unavailable");
            0
        });
        entry.availability = reconcile(&AvailabilityInputs::for_lot(
            &entry.lot,
            detected_free,
            active,
        ));
        entry.detection_error = detection_error;
    }

    if expired {
        tasks.abort_all();
        return Err(ClientError::SessionExpired);
    }
    Ok(results)
}
