//! Selección de dispositivos y contexto de selección (granja / usuario).
//!
//! La selección de dispositivos deriva valores por defecto de la lista de dispositivos
//! de la granja, respeta las elecciones manuales y se limpia al cambiar de granja.
//! El `SelectionContext` reemplaza el estado global implícito: los cambios de granja y
//! de usuario se publican como eventos discretos sobre canales `watch`.


use std::fmt;
use std::str::FromStr;
use serde::Serialize;
use tokio::sync::watch;
use crate::message::domain::{Device, DeviceType};
use crate::system::domain::ErrorType;


/// Clases de sensor que alimentan el dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SensorClass {
    Environment,
    SoilMoisture,
    SoilPh,
}


impl SensorClass {
    pub const ALL: [SensorClass; 3] = [SensorClass::Environment, SensorClass::SoilMoisture, SensorClass::SoilPh];

    pub fn matches(&self, device_type: &DeviceType) -> bool {
        matches!(
            (self, device_type),
            (SensorClass::Environment, DeviceType::Dht22)
                | (SensorClass::SoilMoisture, DeviceType::SoilMoisture)
                | (SensorClass::SoilPh, DeviceType::Ph)
        )
    }
}


impl FromStr for SensorClass {
    type Err = ErrorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "env" | "environment" => Ok(SensorClass::Environment),
            "soil" | "moisture" => Ok(SensorClass::SoilMoisture),
            "ph" => Ok(SensorClass::SoilPh),
            other => Err(ErrorType::Config(format!("clase de sensor desconocida: {other}"))),
        }
    }
}


impl fmt::Display for SensorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorClass::Environment => "env",
            SensorClass::SoilMoisture => "soil",
            SensorClass::SoilPh => "ph",
        };
        f.write_str(name)
    }
}


/// Dispositivos de una clase, en el orden de la lista original.
pub fn devices_of_class(devices: &[Device], class: SensorClass) -> impl Iterator<Item = &Device> {
    devices.iter().filter(move |d| class.matches(&d.device_type))
}


/// Dispositivo seleccionado por clase de sensor.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSelection {
    pub environment: Option<String>,
    pub soil_moisture: Option<String>,
    pub soil_ph: Option<String>,
}


impl DeviceSelection {
    pub fn get(&self, class: SensorClass) -> Option<&str> {
        self.slot(class).as_deref()
    }

    fn slot(&self, class: SensorClass) -> &Option<String> {
        match class {
            SensorClass::Environment => &self.environment,
            SensorClass::SoilMoisture => &self.soil_moisture,
            SensorClass::SoilPh => &self.soil_ph,
        }
    }

    fn slot_mut(&mut self, class: SensorClass) -> &mut Option<String> {
        match class {
            SensorClass::Environment => &mut self.environment,
            SensorClass::SoilMoisture => &mut self.soil_moisture,
            SensorClass::SoilPh => &mut self.soil_ph,
        }
    }

    /// Selección manual. Siempre prevalece sobre el valor por defecto.
    pub fn select(&mut self, class: SensorClass, device_id: Option<String>) {
        *self.slot_mut(class) = device_id;
    }

    /// Completa las clases sin selección con el primer dispositivo de esa clase.
    ///
    /// Devuelve `true` si alguna selección cambió.
    pub fn apply_defaults(&mut self, devices: &[Device]) -> bool {
        let mut changed = false;
        for class in SensorClass::ALL {
            let slot = self.slot_mut(class);
            if slot.is_some() {
                continue;
            }
            if let Some(first) = devices_of_class(devices, class).next() {
                *slot = Some(first.device_id.clone());
                changed = true;
            }
        }
        changed
    }
}


/// Contexto de selección inyectado: granja activa y usuario autenticado.
///
/// Cada cambio se notifica una sola vez; asignar el mismo valor no genera evento.
#[derive(Debug)]
pub struct SelectionContext {
    farm: watch::Sender<Option<String>>,
    user: watch::Sender<Option<String>>,
}


impl SelectionContext {
    pub fn new(farm_id: Option<String>, user_id: Option<String>) -> Self {
        let (farm, _) = watch::channel(farm_id);
        let (user, _) = watch::channel(user_id);
        Self { farm, user }
    }

    pub fn set_farm(&self, farm_id: Option<String>) -> bool {
        replace_if_changed(&self.farm, farm_id)
    }

    pub fn set_user(&self, user_id: Option<String>) -> bool {
        replace_if_changed(&self.user, user_id)
    }

    /// Limpia granja y usuario.
    pub fn logout(&self) {
        self.set_farm(None);
        self.set_user(None);
    }

    pub fn farm_receiver(&self) -> watch::Receiver<Option<String>> {
        self.farm.subscribe()
    }

    pub fn user_receiver(&self) -> watch::Receiver<Option<String>> {
        self.user.subscribe()
    }
}


fn replace_if_changed(tx: &watch::Sender<Option<String>>, value: Option<String>) -> bool {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    })
}
