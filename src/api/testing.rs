use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use tokio::sync::Notify;
use crate::api::domain::TelemetryApi;
use crate::message::domain::{AggregatedPoint, Device, Farm, Summary};
use crate::system::domain::ErrorType;


type SeriesKey = (String, String);


/// API en memoria para tests. Permite retener respuestas hasta que el test las libere.
#[derive(Default)]
pub struct FakeApi {
    farms: Mutex<Vec<Farm>>,
    devices: Mutex<HashMap<String, Vec<Device>>>,
    summaries: Mutex<HashMap<String, Summary>>,
    series: Mutex<HashMap<SeriesKey, Vec<AggregatedPoint>>>,
    failing: Mutex<HashSet<SeriesKey>>,
    failing_farms: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<SeriesKey, Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}


impl FakeApi {
    pub fn with_farms(&self, farms: Vec<Farm>) {
        *self.farms.lock().unwrap() = farms;
    }

    pub fn with_farm(&self, farm_id: &str, devices: Vec<Device>, summary: Summary) {
        self.devices.lock().unwrap().insert(farm_id.into(), devices);
        self.summaries.lock().unwrap().insert(farm_id.into(), summary);
    }

    pub fn with_series(&self, device_id: &str, field: &str, points: Vec<AggregatedPoint>) {
        self.series.lock().unwrap().insert((device_id.into(), field.into()), points);
    }

    pub fn fail_series(&self, device_id: &str, field: &str) {
        self.failing.lock().unwrap().insert((device_id.into(), field.into()));
    }

    pub fn fail_farm(&self, farm_id: &str) {
        self.failing_farms.lock().unwrap().insert(farm_id.into());
    }

    /// Retiene la respuesta de la serie hasta que se llame `notify_one` sobre el `Notify` devuelto.
    pub fn hold_series(&self, device_id: &str, field: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert((device_id.into(), field.into()), gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}


#[async_trait]
impl TelemetryApi for FakeApi {
    async fn farms(&self) -> Result<Vec<Farm>, ErrorType> {
        self.calls.lock().unwrap().push("farms".into());
        Ok(self.farms.lock().unwrap().clone())
    }

    async fn devices(&self, farm_id: &str) -> Result<Vec<Device>, ErrorType> {
        self.calls.lock().unwrap().push(format!("devices {farm_id}"));
        if self.failing_farms.lock().unwrap().contains(farm_id) {
            return Err(ErrorType::TransientFetch("503".into()));
        }
        Ok(self.devices.lock().unwrap().get(farm_id).cloned().unwrap_or_default())
    }

    async fn summary(&self, farm_id: &str) -> Result<Option<Summary>, ErrorType> {
        self.calls.lock().unwrap().push(format!("summary {farm_id}"));
        Ok(self.summaries.lock().unwrap().get(farm_id).cloned())
    }

    async fn aggregated(&self,
                        device_id: &str,
                        field: &str,
                        _window: &str) -> Result<Vec<AggregatedPoint>, ErrorType> {
        let key = (device_id.to_string(), field.to_string());
        self.calls.lock().unwrap().push(format!("aggregated {device_id} {field}"));

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.failing.lock().unwrap().contains(&key) {
            return Err(ErrorType::TransientFetch(format!("500 en {field}")));
        }
        Ok(self.series.lock().unwrap().get(&key).cloned().unwrap_or_default())
    }
}
