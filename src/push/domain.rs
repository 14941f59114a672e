//! Dominio del canal push (publicación / suscripción).
//!
//! Define el transporte abstracto (`PushConnector` / `PushSession`), el estado observable
//! de un canal y el registro compartido de suscripciones activas que garantiza que ningún
//! tópico se suscriba dos veces a la vez para el mismo dueño.


use std::fmt;
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use crate::system::domain::ErrorType;


/// Estado de la máquina de conexión de un canal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}


/// Dueño de una suscripción: la granja activa o el usuario autenticado.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnerKey {
    Farm(String),
    User(String),
}


impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwnerKey::Farm(id) => write!(f, "farm:{id}"),
            OwnerKey::User(id) => write!(f, "user:{id}"),
        }
    }
}


#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub topic: String,
    pub owner: OwnerKey,
}


/// Mensaje entregado por el broker en un tópico suscripto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub destination: String,
    pub body: String,
}


/// Abre conexiones autenticadas contra el broker.
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn PushSession>, ErrorType>;
}


/// Una conexión abierta. Se descarta tras el primer error.
#[async_trait]
pub trait PushSession: Send {
    /// Suscribe el tópico y devuelve el identificador de la suscripción.
    async fn subscribe(&mut self, topic: &str) -> Result<String, ErrorType>;

    async fn unsubscribe(&mut self, subscription_id: &str) -> Result<(), ErrorType>;

    /// Siguiente mensaje. Un error o el cierre del stream es `ErrorType::ChannelFailure`.
    async fn next_message(&mut self) -> Result<PushMessage, ErrorType>;

    async fn close(&mut self);
}


/// Registro de suscripciones vivas, compartido por todos los canales del proceso.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionRegistry {
    active: Arc<DashMap<Subscription, String>>,
}


impl SubscriptionRegistry {

    /// Registra la suscripción. Devuelve `false` si ya existía una viva para el mismo dueño.
    pub fn try_register(&self, subscription: &Subscription, subscription_id: &str) -> bool {
        match self.active.entry(subscription.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(subscription_id.to_string());
                true
            }
        }
    }

    pub fn release(&self, subscription: &Subscription) {
        self.active.remove(subscription);
    }

    pub fn is_active(&self, subscription: &Subscription) -> bool {
        self.active.contains_key(subscription)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }
}
