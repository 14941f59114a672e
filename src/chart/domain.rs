use std::collections::BTreeMap;
use std::str::FromStr;
use serde::Serialize;
use crate::selection::domain::{DeviceSelection, SensorClass};
use crate::system::domain::ErrorType;


/// Pestaña activa del gráfico.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChartMode {
    /// Temperatura y humedad del mismo sensor ambiental.
    #[default]
    Environment,
    /// Humedad de suelo y pH, de dos dispositivos independientes.
    Soil,
}


impl FromStr for ChartMode {
    type Err = ErrorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "env" | "environment" => Ok(ChartMode::Environment),
            "soil" => Ok(ChartMode::Soil),
            other => Err(ErrorType::Config(format!("modo de gráfico desconocido: {other}"))),
        }
    }
}


/// Una fila del gráfico: etiqueta de tiempo y valores dispersos por clave.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRow {
    pub time_label: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, f64>,
}


impl ChartRow {
    pub fn new(time_label: impl Into<String>) -> Self {
        Self { time_label: time_label.into(), values: BTreeMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }
}


/// Una serie a pedir: dispositivo, campo de la consulta y clave en la fila del gráfico.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesQuery {
    pub device_id: String,
    pub field: &'static str,
    pub key: &'static str,
}


/// Par de series que alimenta un gráfico.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartRequest {
    pub mode: ChartMode,
    pub series: [SeriesQuery; 2],
}


impl ChartRequest {

    /// Construye la petición para el modo activo.
    ///
    /// Devuelve `None` ("no listo") si falta algún dispositivo requerido.
    pub fn for_selection(mode: ChartMode, selection: &DeviceSelection) -> Option<Self> {
        let series = match mode {
            ChartMode::Environment => {
                let device = selection.get(SensorClass::Environment)?;
                [
                    SeriesQuery { device_id: device.to_string(), field: "temperature", key: "temperature" },
                    SeriesQuery { device_id: device.to_string(), field: "humidity", key: "humidity" },
                ]
            }
            ChartMode::Soil => {
                let moisture = selection.get(SensorClass::SoilMoisture)?;
                let ph = selection.get(SensorClass::SoilPh)?;
                [
                    SeriesQuery { device_id: moisture.to_string(), field: "soil_moisture", key: "soilMoisture" },
                    SeriesQuery { device_id: ph.to_string(), field: "soilPH", key: "soilPH" },
                ]
            }
        };
        Some(Self { mode, series })
    }
}
