use async_trait::async_trait;
use crate::message::domain::{AggregatedPoint, Device, Farm, Summary};
use crate::system::domain::ErrorType;


/// Consultas REST de solo lectura que consume el motor de sincronización.
///
/// Toda falla de red, de estado HTTP o de decodificación se reporta como
/// `ErrorType::TransientFetch`.
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// `GET /farms`
    async fn farms(&self) -> Result<Vec<Farm>, ErrorType>;

    /// `GET /devices?farmId=…`
    async fn devices(&self, farm_id: &str) -> Result<Vec<Device>, ErrorType>;

    /// `GET /reports/summary?farmId=…`. `None` si el backend no tiene resumen.
    async fn summary(&self, farm_id: &str) -> Result<Option<Summary>, ErrorType>;

    /// `GET /devices/{id}/data/aggregated?field=…&window=…`
    async fn aggregated(&self,
                        device_id: &str,
                        field: &str,
                        window: &str) -> Result<Vec<AggregatedPoint>, ErrorType>;
}
