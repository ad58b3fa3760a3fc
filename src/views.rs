//! Plain-text renderings of the client's views.

use crate::api::models::{Lot, Reservation, User};
use crate::availability::FreeSource;
use crate::availability::monitor::LotAvailability;
use crate::availability::summary::{FleetSummary, SearchSummary};
use crate::forms::{ReservationForm, ValidationErrors};
use crate::state::LotView;
use time::Date;
use time::macros::format_description;

const MISSING: &str = "N/A";

/// `YYYY-MM-DD` (optionally followed by a time part) as `dd/mm/yyyy`.
pub fn format_date(value: Option<&str>) -> String {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return MISSING.to_string();
    };
    let date_part = value.get(..10).unwrap_or(value);
    Date::parse(date_part, format_description!("[year]-[month]-[day]"))
        .ok()
        .and_then(|date| {
            date.format(format_description!("[day]/[month]/[year]"))
                .ok()
        })
        .unwrap_or_else(|| MISSING.to_string())
}

/// `HH:MM[:SS]` trimmed to `HH:MM`.
pub fn format_time(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => value.get(..5).unwrap_or(value).to_string(),
        None => MISSING.to_string(),
    }
}

pub fn format_price(amount: f64) -> String {
    format!("${amount:.2}")
}

pub fn render_user(user: &User) -> String {
    format!(
        "{} <{}>\nrole: {}\nid: {}",
        user.nombre, user.email, user.rol, user.id
    )
}

pub fn render_lot_list(lots: &[&Lot], summary: &SearchSummary) -> String {
    let mut lines = vec![format!(
        "{} lots found, {} with free spaces, average price {}/h",
        summary.found,
        summary.available,
        format_price(summary.average_price)
    )];
    if lots.is_empty() {
        lines.push("No parking lots match the search.".to_string());
    }
    for lot in lots {
        lines.push(format!(
            "[{}] {} | {} | {}/h | {}/{} free | {}",
            lot.id,
            lot.nombre,
            lot.direccion,
            format_price(lot.precio),
            lot.espacios_disponibles,
            lot.espacios_total,
            lot.horario
        ));
    }
    lines.join("\n")
}

pub fn render_lot_detail(view: &LotView) -> String {
    let lot = &view.lot;
    let availability = &view.availability;
    let source = match availability.source {
        FreeSource::Detection => "camera",
        FreeSource::Backend => "last reported",
    };

    let mut lines = vec![
        format!("{} (#{})", lot.nombre, lot.id),
        format!("Address: {}", lot.direccion),
        format!("Hours: {}", lot.horario),
        format!("Price: {}/h", format_price(lot.precio)),
    ];
    if let Some(error) = &view.detection_error {
        lines.push(format!("! Occupancy detection unavailable: {error}"));
    }
    lines.push(format!("Total spaces: {}", availability.total));
    lines.push(format!("Free spaces: {} ({source})", availability.free));
    lines.push(format!(
        "Active reservations: {}",
        availability.active_reservations
    ));
    lines.push(format!("Reservable now: {}", availability.reservable_now));
    lines.push(format!(
        "Occupied: {} ({:.1}% including reservations)",
        availability.physically_occupied, availability.occupancy_percent
    ));
    if let Some(detection) = &view.detection {
        let image = if detection.image_annotated.is_some() {
            "annotated frame available"
        } else {
            "no frame"
        };
        lines.push(format!("Detection: {} zones, {image}", detection.zone_count));
    }
    if view.loading {
        lines.push("Refreshing...".to_string());
    }
    lines.join("\n")
}

pub fn render_dashboard(fleet: &[LotAvailability], summary: &FleetSummary) -> String {
    let mut lines = vec![
        format!("Lots: {}", summary.lots),
        format!("Total spaces: {}", summary.total_spaces),
        format!("Free spaces: {}", summary.free),
        format!("Active reservations: {}", summary.active_reservations),
        format!("Reservable now: {}", summary.reservable_now),
        format!(
            "Occupied: {} ({:.1}%)",
            summary.physically_occupied,
            summary.occupancy_percent()
        ),
    ];
    if fleet.is_empty() {
        lines.push("You have no registered parking lots.".to_string());
    }
    for entry in fleet {
        let mut line = format!(
            "[{}] {}: {}/{} free, {} reserved, {} reservable, {:.1}%",
            entry.lot.id,
            entry.lot.nombre,
            entry.availability.free,
            entry.availability.total,
            entry.availability.active_reservations,
            entry.availability.reservable_now,
            entry.availability.occupancy_percent
        );
        if entry.detection_error.is_some() {
            line.push_str(" (detection unavailable)");
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn render_reservations(reservations: &[Reservation]) -> String {
    if reservations.is_empty() {
        return "No reservations.".to_string();
    }
    reservations
        .iter()
        .map(|reservation| {
            format!(
                "#{} lot {} | {} {}-{} | plate {} | {}",
                reservation.id,
                reservation.estacionamiento_id,
                format_date(reservation.fecha_reserva.as_deref()),
                format_time(reservation.hora_inicio.as_deref()),
                format_time(reservation.hora_fin.as_deref()),
                reservation.placa_vehiculo.as_deref().unwrap_or(MISSING),
                reservation.estado
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_quote(form: &ReservationForm, lot: &Lot) -> String {
    format!(
        "{:.2} h at {}/h: estimated {}",
        form.duration_hours(),
        format_price(lot.precio),
        format_price(form.estimated_price(lot.precio))
    )
}

pub fn render_validation(errors: &ValidationErrors) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::ReservationStatus;
    use crate::state::LotViewState;

    fn lot() -> Lot {
        Lot {
            id: 3,
            nombre: "Centro".to_string(),
            direccion: "Av. Principal #123".to_string(),
            horario: "24 horas".to_string(),
            precio: 25.5,
            espacios_total: 100,
            espacios_disponibles: 40,
            duenio_id: Some(1),
            fecha_creacion: None,
            activo: Some(true),
        }
    }

    #[test]
    fn dates_render_day_first_or_placeholder() {
        assert_eq!(format_date(Some("2025-03-09")), "09/03/2025");
        assert_eq!(format_date(Some("2025-03-09T10:00:00")), "09/03/2025");
        assert_eq!(format_date(Some("09-03-2025")), "N/A");
        assert_eq!(format_date(None), "N/A");
        assert_eq!(format_time(Some("08:30:00")), "08:30");
        assert_eq!(format_time(Some(" ")), "N/A");
    }

    #[test]
    fn reservations_list_handles_missing_fields() {
        let reservation = Reservation {
            id: 9,
            usuario_id: 2,
            estacionamiento_id: 3,
            cajon_id: None,
            fecha_reserva: None,
            hora_inicio: Some("10:00".to_string()),
            hora_fin: Some("12:00".to_string()),
            placa_vehiculo: None,
            estado: ReservationStatus::Pendiente,
        };
        let text = render_reservations(&[reservation]);
        assert_eq!(text, "#9 lot 3 | N/A 10:00-12:00 | plate N/A | pendiente");
        assert_eq!(render_reservations(&[]), "No reservations.");
    }

    #[test]
    fn lot_detail_shows_fallback_source_and_banner() {
        let mut state = LotViewState::new(lot());
        state.apply_refresh(
            crate::state::RefreshResults {
                detection: Err("connection refused".to_string()),
                active_reservations: Ok(4),
            },
            std::time::UNIX_EPOCH,
        );
        let text = render_lot_detail(state.view());
        assert!(text.contains("Free spaces: 40 (last reported)"));
        assert!(text.contains("Reservable now: 36"));
        assert!(text.contains("! Occupancy detection unavailable: connection refused"));
    }

    #[test]
    fn lot_list_reports_empty_search() {
        let text = render_lot_list(&[], &SearchSummary::default());
        assert!(text.starts_with("0 lots found"));
        assert!(text.contains("No parking lots match the search."));
    }
}
