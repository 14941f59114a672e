//! Dominio de Mensajería y Modelos de Datos.
//!
//! Este módulo define las estructuras de datos que llegan desde el backend, tanto por
//! la API REST (granjas, dispositivos, resumen, series agregadas) como por el canal
//! push (datos de sensores y notificaciones).
//!


use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};


/// Sobre estándar de las respuestas REST: `{ "data": ... }`.
///
/// `data` ausente o `null` se normaliza a `None`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default = "none")]
    pub data: Option<T>,
}


fn none<T>() -> Option<T> {
    None
}


/// Granja registrada por el usuario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Farm {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}


/// Clase de sensor tal como la reporta el backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum DeviceType {
    /// Sensor ambiental de temperatura y humedad.
    Dht22,
    SoilMoisture,
    Ph,
    Other(String),
}


impl From<String> for DeviceType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "SENSOR_DHT22" => DeviceType::Dht22,
            "SENSOR_SOIL_MOISTURE" => DeviceType::SoilMoisture,
            "SENSOR_PH" => DeviceType::Ph,
            _ => DeviceType::Other(raw),
        }
    }
}


impl From<DeviceType> for String {
    fn from(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Dht22 => "SENSOR_DHT22".to_string(),
            DeviceType::SoilMoisture => "SENSOR_SOIL_MOISTURE".to_string(),
            DeviceType::Ph => "SENSOR_PH".to_string(),
            DeviceType::Other(raw) => raw,
        }
    }
}


/// Dispositivo físico asociado a una granja.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    #[serde(rename = "deviceId", deserialize_with = "de_id")]
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    #[serde(rename = "farmId", default, deserialize_with = "de_opt_id")]
    pub farm_id: Option<String>,
}


impl Device {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.device_id)
    }
}


/// Un punto por ventana de agregación. `average_value` es `None` si la ventana no tuvo muestras.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedPoint {
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "avgValue", alias = "averageValue", default)]
    pub average_value: Option<f64>,
}


/// Promedios ambientales de la granja.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AverageEnvironment {
    #[serde(default)]
    pub avg_temperature: Option<f64>,
    #[serde(default)]
    pub avg_humidity: Option<f64>,
    #[serde(default)]
    pub avg_soil_moisture: Option<f64>,
    #[serde(rename = "avgSoilPH", default)]
    pub avg_soil_ph: Option<f64>,
    #[serde(default)]
    pub avg_light_intensity: Option<f64>,
}


/// Estado actual materializado de la granja.
///
/// Cada campo es independiente: el último valor escrito gana.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default)]
    pub online_devices: u32,
    #[serde(default)]
    pub total_devices: u32,
    #[serde(default)]
    pub average_environment: AverageEnvironment,
}


impl Summary {

    /// Aplica una actualización incremental campo a campo.
    ///
    /// Solo se tocan los campos presentes en `patch`; el resto conserva su valor.
    /// Devuelve la cantidad de campos modificados.
    pub fn apply(&mut self, patch: &SensorDataMessage) -> usize {
        let avg = &mut self.average_environment;
        let pairs = [
            (&mut avg.avg_temperature, patch.temperature),
            (&mut avg.avg_humidity, patch.humidity),
            (&mut avg.avg_soil_moisture, patch.soil_moisture),
            (&mut avg.avg_soil_ph, patch.soil_ph),
            (&mut avg.avg_light_intensity, patch.light_intensity),
        ];

        let mut patched = 0;
        for (field, value) in pairs {
            if let Some(v) = value {
                *field = Some(v);
                patched += 1;
            }
        }
        patched
    }
}


/// Payload incremental publicado en `/topic/farm/{farmId}/sensor-data`.
///
/// Cualquier subconjunto de campos puede venir presente.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorDataMessage {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub soil_moisture: Option<f64>,
    #[serde(rename = "soilPH", default)]
    pub soil_ph: Option<f64>,
    #[serde(default)]
    pub light_intensity: Option<f64>,
}


impl SensorDataMessage {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none() && self.soil_moisture.is_none()
            && self.soil_ph.is_none() && self.light_intensity.is_none()
    }
}


/// Alerta publicada en `/topic/user/{userId}/notifications`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationMessage {
    pub title: String,
    pub message: String,
}


#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}


impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}


/// Los identificadores llegan como texto o como número según el endpoint.
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawId::deserialize(deserializer).map(String::from)
}


fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Option::<RawId>::deserialize(deserializer).map(|id| id.map(String::from))
}


/// Acepta RFC 3339 o fecha sin zona (interpretada como UTC).
fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}
