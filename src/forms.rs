//! Client-side form validation.
//!
//! Every check here is synchronous and runs before any request is built, so a
//! rejected form never reaches the network.

use crate::api::models::{LotId, NewReservation, Role, UserId};
use std::collections::BTreeMap;
use std::fmt;
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Field name to message, ordered by field name for stable output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(field, message)| (*field, message.as_str()))
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Loose email shape check: some non-space text, `@`, non-space text, `.`, non-space text.
pub fn looks_like_email(value: &str) -> bool {
    value.split_whitespace().any(|token| {
        token
            .char_indices()
            .filter(|(at, c)| *c == '@' && *at > 0)
            .any(|(at, _)| {
                let domain = &token[at + 1..];
                domain
                    .char_indices()
                    .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
            })
    })
}

fn check_name(errors: &mut ValidationErrors, nombre: &str) {
    if nombre.trim().is_empty() {
        errors.add("nombre", "name is required");
    }
}

fn check_email(errors: &mut ValidationErrors, email: &str) {
    if email.trim().is_empty() {
        errors.add("email", "email is required");
    } else if !looks_like_email(email) {
        errors.add("email", "email is not valid");
    }
}

fn check_new_password(
    errors: &mut ValidationErrors,
    field: &'static str,
    confirm_field: &'static str,
    password: &str,
    confirmation: &str,
) {
    if password.is_empty() {
        errors.add(field, "password is required");
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            field,
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }

    if confirmation.is_empty() {
        errors.add(confirm_field, "confirm the password");
    } else if password != confirmation {
        errors.add(confirm_field, "passwords do not match");
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.email.trim().is_empty() {
            errors.add("email", "email is required");
        }
        if self.password.is_empty() {
            errors.add("password", "password is required");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub nombre: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub rol: Option<Role>,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.nombre);
        check_email(&mut errors, &self.email);
        check_new_password(
            &mut errors,
            "password",
            "confirm_password",
            &self.password,
            &self.confirm_password,
        );
        if self.rol.is_none() {
            errors.add("rol", "select a role");
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_new_password: String,
}

#[derive(Debug, Clone)]
pub struct ProfileForm {
    pub nombre: String,
    pub email: String,
    pub rol: Role,
    /// Present only when the user asked to change the password.
    pub password_change: Option<PasswordChange>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_name(&mut errors, &self.nombre);
        check_email(&mut errors, &self.email);
        if let Some(change) = &self.password_change {
            if change.current_password.is_empty() {
                errors.add("current_password", "current password is required");
            }
            check_new_password(
                &mut errors,
                "new_password",
                "confirm_new_password",
                &change.new_password,
                &change.confirm_new_password,
            );
        }
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReservationForm {
    pub placa_vehiculo: String,
    /// `YYYY-MM-DD`
    pub fecha: String,
    /// `HH:MM`
    pub hora_inicio: String,
    /// `HH:MM`
    pub hora_fin: String,
}

fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).ok()
}

fn parse_time(value: &str) -> Option<Time> {
    let value = value.trim();
    Time::parse(value, format_description!("[hour]:[minute]"))
        .or_else(|_| Time::parse(value, format_description!("[hour]:[minute]:[second]")))
        .ok()
}

/// Today's date in the local timezone, or UTC when the offset is unknown.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

impl ReservationForm {
    /// Checks the fields alone; needs no lot data, so it runs before any fetch.
    pub fn validate_fields(&self) -> Result<(), ValidationErrors> {
        self.validate_fields_on(today())
    }

    pub fn validate_fields_on(&self, today: Date) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.check_fields(&mut errors, today);
        errors.into_result()
    }

    /// Validates the form against the lot's current reservable count.
    pub fn validate(&self, reservable_now: u32) -> Result<(), ValidationErrors> {
        self.validate_on(reservable_now, today())
    }

    pub fn validate_on(&self, reservable_now: u32, today: Date) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        self.check_fields(&mut errors, today);
        if reservable_now == 0 {
            errors.add("estacionamiento", "no spaces available to reserve");
        }
        errors.into_result()
    }

    fn check_fields(&self, errors: &mut ValidationErrors, today: Date) {
        if self.placa_vehiculo.trim().is_empty() {
            errors.add("placa_vehiculo", "license plate is required");
        }
        if self.fecha.trim().is_empty() {
            errors.add("fecha", "date is required");
        } else {
            match parse_date(&self.fecha) {
                None => errors.add("fecha", "date must be YYYY-MM-DD"),
                Some(date) if date < today => errors.add("fecha", "date cannot be in the past"),
                Some(_) => {}
            }
        }

        let start = self.time_field(errors, "hora_inicio", &self.hora_inicio);
        let end = self.time_field(errors, "hora_fin", &self.hora_fin);
        if let (Some(start), Some(end)) = (start, end)
            && start >= end
        {
            errors.add("hora_fin", "end time must be after start time");
        }
    }

    fn time_field(
        &self,
        errors: &mut ValidationErrors,
        field: &'static str,
        value: &str,
    ) -> Option<Time> {
        if value.trim().is_empty() {
            errors.add(field, "time is required");
            return None;
        }
        let parsed = parse_time(value);
        if parsed.is_none() {
            errors.add(field, "time must be HH:MM");
        }
        parsed
    }

    /// Hours between start and end, or 0 when the range is missing or inverted.
    pub fn duration_hours(&self) -> f64 {
        match (parse_time(&self.hora_inicio), parse_time(&self.hora_fin)) {
            (Some(start), Some(end)) if end > start => (end - start).as_seconds_f64() / 3600.0,
            _ => 0.0,
        }
    }

    /// Estimated price rounded to cents.
    pub fn estimated_price(&self, hourly_price: f64) -> f64 {
        (self.duration_hours() * hourly_price * 100.0).round() / 100.0
    }

    pub fn to_request(&self, lot_id: LotId, user_id: UserId) -> NewReservation {
        NewReservation {
            estacionamiento_id: lot_id,
            usuario_id: user_id,
            placa_vehiculo: self.placa_vehiculo.trim().to_string(),
            fecha_reserva: self.fecha.trim().to_string(),
            hora_inicio: self.hora_inicio.trim().to_string(),
            hora_fin: self.hora_fin.trim().to_string(),
        }
    }
}
