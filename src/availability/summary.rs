use crate::api::models::{Lot, LotQuery};
use crate::availability::Availability;

/// Totals across an owner's lots.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FleetSummary {
    pub lots: usize,
    pub total_spaces: u32,
    pub free: u32,
    pub active_reservations: u32,
    pub reservable_now: u32,
    pub physically_occupied: u32,
}

impl FleetSummary {
    pub fn from_availability<'a>(items: impl IntoIterator<Item = &'a Availability>) -> Self {
        items.into_iter().fold(Self::default(), |mut acc, item| {
            acc.lots += 1;
            acc.total_spaces += item.total;
            acc.free += item.free;
            acc.active_reservations += item.active_reservations;
            acc.reservable_now += item.reservable_now;
            acc.physically_occupied += item.physically_occupied;
            acc
        })
    }

    pub fn occupancy_percent(&self) -> f64 {
        if self.total_spaces == 0 {
            return 0.0;
        }
        let busy = self.physically_occupied as f64 + self.active_reservations as f64;
        (busy / self.total_spaces as f64 * 100.0).clamp(0.0, 100.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SearchSummary {
    pub found: usize,
    pub available: usize,
    pub average_price: f64,
}

impl SearchSummary {
    pub fn of(lots: &[&Lot]) -> Self {
        if lots.is_empty() {
            return Self::default();
        }
        let total_price: f64 = lots.iter().map(|lot| lot.precio).sum();
        Self {
            found: lots.len(),
            available: lots.iter().filter(|lot| lot.espacios_disponibles > 0).count(),
            average_price: total_price / lots.len() as f64,
        }
    }
}

/// Applies `query` locally, matching what the backend does with the same params.
pub fn filter_lots<'a>(lots: &'a [Lot], query: &LotQuery) -> Vec<&'a Lot> {
    let needle = query.text.as_deref().unwrap_or_default().trim().to_lowercase();
    lots.iter()
        .filter(|lot| {
            needle.is_empty()
                || lot.nombre.to_lowercase().contains(&needle)
                || lot.direccion.to_lowercase().contains(&needle)
        })
        .filter(|lot| query.max_price.is_none_or(|max| lot.precio <= max))
        .filter(|lot| !query.only_available || lot.espacios_disponibles > 0)
        .collect()
}
