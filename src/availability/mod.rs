//! Availability reconciliation.
//!
//! Three numbers arrive independently for a lot: its capacity, the free count
//! reported by the occupancy detector, and the number of active reservations.
//! [`reconcile`] is the single place they are combined into what a customer
//! sees. It is pure: no I/O, and equal inputs give equal outputs.

use crate::api::models::Lot;

pub mod monitor;
pub mod summary;

/// Where the free-space figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeSource {
    /// The occupancy detector answered.
    Detection,
    /// Detector has not answered; the backend's stored count stands in.
    Backend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityInputs {
    pub total: u32,
    pub detected_free: Option<u32>,
    /// Stored `espacios_disponibles`, used only when `detected_free` is `None`.
    pub backend_free: u32,
    pub active_reservations: u32,
}

impl AvailabilityInputs {
    pub fn for_lot(lot: &Lot, detected_free: Option<u32>, active_reservations: u32) -> Self {
        Self {
            total: lot.espacios_total,
            detected_free,
            backend_free: lot.espacios_disponibles,
            active_reservations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Availability {
    pub total: u32,
    /// Physically free spaces, never above `total`.
    pub free: u32,
    pub source: FreeSource,
    pub active_reservations: u32,
    /// Spaces a new customer can book now: `max(0, min(free - reserved, free))`.
    pub reservable_now: u32,
    /// `total - free`, independent of reservations.
    pub physically_occupied: u32,
    /// `(physically_occupied + active_reservations) / total * 100`, clamped to [0, 100].
    pub occupancy_percent: f64,
}

impl Availability {
    pub fn is_reservable(&self) -> bool {
        self.reservable_now > 0
    }
}

pub fn reconcile(inputs: &AvailabilityInputs) -> Availability {
    let (raw_free, source) = match inputs.detected_free {
        Some(detected) => (detected, FreeSource::Detection),
        None => (inputs.backend_free, FreeSource::Backend),
    };
    let free = raw_free.min(inputs.total);
    let reservable_now = free.saturating_sub(inputs.active_reservations);
    let physically_occupied = inputs.total - free;

    Availability {
        total: inputs.total,
        free,
        source,
        active_reservations: inputs.active_reservations,
        reservable_now,
        physically_occupied,
        occupancy_percent: occupancy_percent(
            inputs.total,
            physically_occupied,
            inputs.active_reservations,
        ),
    }
}

fn occupancy_percent(total: u32, physically_occupied: u32, active_reservations: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let busy = physically_occupied as f64 + active_reservations as f64;
    ((busy / total as f64) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(total: u32, detected_free: Option<u32>, active: u32) -> AvailabilityInputs {
        AvailabilityInputs {
            total,
            detected_free,
            backend_free: total / 2,
            active_reservations: active,
        }
    }

    #[test]
    fn reference_scenario() {
        let result = reconcile(&inputs(100, Some(45), 10));
        assert_eq!(result.reservable_now, 35);
        assert_eq!(result.physically_occupied, 55);
        assert_eq!(result.occupancy_percent, 65.0);
        assert_eq!(result.source, FreeSource::Detection);
    }

    #[test]
    fn reservable_stays_within_detected_free_or_total() {
        for total in 0..=12u32 {
            for active in 0..=15u32 {
                for detected in (0..=total).map(Some).chain([None]) {
                    let result = reconcile(&inputs(total, detected, active));
                    let upper = detected.unwrap_or(total);
                    assert!(result.reservable_now <= upper);
                    assert!(result.reservable_now <= result.total);
                    assert!(result.physically_occupied <= result.total);
                    assert!((0.0..=100.0).contains(&result.occupancy_percent));
                }
            }
        }
    }

    #[test]
    fn zero_detected_free_means_nothing_reservable() {
        for active in [0, 1, 50] {
            assert_eq!(reconcile(&inputs(20, Some(0), active)).reservable_now, 0);
        }
    }

    #[test]
    fn reservations_at_or_above_free_leave_nothing() {
        assert_eq!(reconcile(&inputs(20, Some(5), 5)).reservable_now, 0);
        assert_eq!(reconcile(&inputs(20, Some(5), 9)).reservable_now, 0);
        assert_eq!(reconcile(&inputs(20, Some(5), 4)).reservable_now, 1);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let input = inputs(37, Some(11), 3);
        let first = reconcile(&input);
        let second = reconcile(&input);
        assert_eq!(first, second);
        assert_eq!(
            first.occupancy_percent.to_bits(),
            second.occupancy_percent.to_bits()
        );
    }

    #[test]
    fn missing_detection_falls_back_to_backend_count() {
        let result = reconcile(&AvailabilityInputs {
            total: 50,
            detected_free: None,
            backend_free: 18,
            active_reservations: 3,
        });
        assert_eq!(result.source, FreeSource::Backend);
        assert_eq!(result.free, 18);
        assert_eq!(result.reservable_now, 15);
        assert_eq!(result.physically_occupied, 32);
    }

    #[test]
    fn free_above_capacity_is_clamped() {
        let result = reconcile(&inputs(10, Some(14), 2));
        assert_eq!(result.free, 10);
        assert_eq!(result.physically_occupied, 0);
        assert_eq!(result.reservable_now, 8);
    }

    #[test]
    fn empty_lot_reports_zero_percent() {
        let result = reconcile(&inputs(0, None, 4));
        assert_eq!(result.occupancy_percent, 0.0);
        assert_eq!(result.reservable_now, 0);
    }

    #[test]
    fn occupancy_percent_is_capped() {
        let result = reconcile(&inputs(10, Some(2), 9));
        assert_eq!(result.occupancy_percent, 100.0);
    }
}
