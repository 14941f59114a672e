use crate::message::domain::{NotificationMessage, SensorDataMessage};
use crate::system::domain::ErrorType;


pub fn farm_sensor_topic(farm_id: &str) -> String {
    format!("/topic/farm/{farm_id}/sensor-data")
}


pub fn user_notification_topic(user_id: &str) -> String {
    format!("/topic/user/{user_id}/notifications")
}


/// Decodifica un payload de `sensor-data`.
///
/// Un JSON inválido, un valor que no sea objeto o un campo con tipo incorrecto
/// producen `ErrorType::MalformedMessage`.
pub fn decode_sensor_data(body: &str) -> Result<SensorDataMessage, ErrorType> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(ErrorType::MalformedMessage("se esperaba un objeto JSON".into()));
    }
    Ok(serde_json::from_value(value)?)
}


pub fn decode_notification(body: &str) -> Result<NotificationMessage, ErrorType> {
    Ok(serde_json::from_str(body)?)
}
