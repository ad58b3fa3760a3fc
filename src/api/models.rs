use serde::{Deserialize, Serialize};
use std::fmt;

pub type UserId = i64;
pub type LotId = i64;
pub type ReservationId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Duenio,
    Usuario,
    #[serde(untagged)]
    Other(String),
}

impl Role {
    pub fn is_owner(&self) -> bool {
        matches!(self, Role::Duenio)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Duenio => "duenio",
            Role::Usuario => "usuario",
            Role::Other(other) => other,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub nombre: String,
    pub email: String,
    pub rol: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub usuario: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser<'a> {
    pub nombre: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub rol: &'a Role,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate<'a> {
    pub nombre: &'a str,
    pub email: &'a str,
    pub rol: &'a Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<&'a str>,
}

/// A parking lot as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub nombre: String,
    #[serde(default)]
    pub direccion: String,
    #[serde(default)]
    pub horario: String,
    #[serde(default)]
    pub precio: f64,
    #[serde(default)]
    pub espacios_total: u32,
    /// Free spaces last written by the owner; the static fallback when detection is absent.
    #[serde(default)]
    pub espacios_disponibles: u32,
    #[serde(default)]
    pub duenio_id: Option<UserId>,
    #[serde(default)]
    pub fecha_creacion: Option<String>,
    #[serde(default)]
    pub activo: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpacesUpdate {
    pub espacios_disponibles: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DetectionStatistics {
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub occupied: Option<u32>,
    #[serde(default)]
    pub available: Option<u32>,
    #[serde(default)]
    pub occupancy_rate: Option<f64>,
}

/// Response of the occupancy detector for one lot.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Detection {
    /// Annotated camera frame as a `data:image/jpeg;base64,...` URI.
    #[serde(default)]
    pub image_annotated: Option<String>,
    #[serde(default)]
    pub available: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    #[serde(default)]
    pub occupied: Option<u32>,
    #[serde(default)]
    pub occupancy_rate: Option<f64>,
    #[serde(default)]
    pub zones: Option<serde_json::Value>,
    #[serde(default)]
    pub statistics: Option<DetectionStatistics>,
}

impl Detection {
    pub fn zone_count(&self) -> usize {
        match &self.zones {
            Some(serde_json::Value::Array(zones)) => zones.len(),
            Some(serde_json::Value::Object(zones)) => zones.len(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveReservations {
    #[serde(default)]
    pub reservas_activas: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pendiente,
    Aceptada,
    Rechazada,
    Cancelada,
    #[serde(untagged)]
    Other(String),
}

impl ReservationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ReservationStatus::Pendiente => "pendiente",
            ReservationStatus::Aceptada => "aceptada",
            ReservationStatus::Rechazada => "rechazada",
            ReservationStatus::Cancelada => "cancelada",
            ReservationStatus::Other(other) => other,
        }
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Pendiente | ReservationStatus::Aceptada
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub usuario_id: UserId,
    pub estacionamiento_id: LotId,
    #[serde(default)]
    pub cajon_id: Option<i64>,
    #[serde(default)]
    pub fecha_reserva: Option<String>,
    #[serde(default)]
    pub hora_inicio: Option<String>,
    #[serde(default)]
    pub hora_fin: Option<String>,
    #[serde(default)]
    pub placa_vehiculo: Option<String>,
    pub estado: ReservationStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewReservation {
    pub estacionamiento_id: LotId,
    pub usuario_id: UserId,
    pub placa_vehiculo: String,
    /// `YYYY-MM-DD`
    pub fecha_reserva: String,
    /// `HH:MM`
    pub hora_inicio: String,
    /// `HH:MM`
    pub hora_fin: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Query for `GET /estacionamientos`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LotQuery {
    pub text: Option<String>,
    pub max_price: Option<f64>,
    pub only_available: bool,
}

impl LotQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(text) = self.text.as_deref().filter(|t| !t.trim().is_empty()) {
            params.push(("nombre", text.to_string()));
        }
        if let Some(max_price) = self.max_price {
            params.push(("precio_max", max_price.to_string()));
        }
        if self.only_available {
            params.push(("solo_disponibles", "true".to_string()));
        }
        params
    }
}
