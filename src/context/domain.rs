//! Definición del Contexto de Aplicación (Shared State).
//!
//! Este módulo implementa el patrón de **Estado Compartido** para aplicaciones asíncronas.
//! El `AppContext` actúa como un contenedor de "Inyección de Dependencias" manual,
//! agrupando los recursos que deben ser accesibles por múltiples tareas concurrentes
//! (API REST, conector push, registro de suscripciones, Configuración).


use std::sync::Arc;
use crate::api::domain::TelemetryApi;
use crate::api::logic::HttpApi;
use crate::push::domain::{PushConnector, SubscriptionRegistry};
use crate::push::websocket::StompConnector;
use crate::system::domain::{ErrorType, System};


#[derive(Clone)]
pub struct AppContext {
    pub system: Arc<System>,
    pub api: Arc<dyn TelemetryApi>,
    pub connector: Arc<dyn PushConnector>,
    pub subscriptions: SubscriptionRegistry,
}


impl AppContext {
    pub fn new(system: System) -> Result<Self, ErrorType> {
        let api = Arc::new(HttpApi::new(&system)?);
        let connector = Arc::new(StompConnector::new(&system)?);
        Ok(Self::with_parts(system, api, connector))
    }

    pub fn with_parts(system: System,
                      api: Arc<dyn TelemetryApi>,
                      connector: Arc<dyn PushConnector>) -> Self {
        Self {
            system: Arc::new(system),
            api,
            connector,
            subscriptions: SubscriptionRegistry::default(),
        }
    }
}


#[cfg(test)]
pub fn test_context(api: Arc<crate::api::testing::FakeApi>,
                    connector: Arc<crate::push::testing::FakeConnector>) -> AppContext {
    AppContext::with_parts(crate::system::domain::test_system(), api, connector)
}
