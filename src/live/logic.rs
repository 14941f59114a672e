//! Canal de resumen en vivo por granja.
//!
//! Mantiene una única suscripción a `/topic/farm/{farmId}/sensor-data` y traduce cada
//! payload en un parche (`SummaryUpdate`) para el orquestador. El canal nunca modifica
//! el resumen por su cuenta.


use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};
use crate::context::domain::AppContext;
use crate::dashboard::domain::SummaryUpdate;
use crate::message::logic::{decode_sensor_data, farm_sensor_topic};
use crate::push::domain::{ChannelState, OwnerKey, PushMessage, Subscription};
use crate::push::logic::{MessageHandler, PushChannel};


pub struct LiveSummaryChannel {
    channel: PushChannel,
    tx: mpsc::Sender<SummaryUpdate>,
}


impl LiveSummaryChannel {
    pub fn new(tx_to_dashboard: mpsc::Sender<SummaryUpdate>, app_context: &AppContext) -> Self {
        let channel = PushChannel::new("live-summary",
                                       app_context.connector.clone(),
                                       app_context.subscriptions.clone());
        Self { channel, tx: tx_to_dashboard }
    }

    /// Abre la suscripción de la granja. Si había otra granja, la cierra primero.
    pub async fn start(&mut self, farm_id: &str) {
        let subscription = Subscription {
            topic: farm_sensor_topic(farm_id),
            owner: OwnerKey::Farm(farm_id.to_string()),
        };
        let handler = SensorDataHandler { farm_id: farm_id.to_string(), tx: self.tx.clone() };
        self.channel.start(subscription, handler).await;
    }

    pub async fn stop(&mut self) {
        self.channel.stop().await;
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }

    #[cfg(test)]
    pub fn watch_state(&self) -> tokio::sync::watch::Receiver<ChannelState> {
        self.channel.watch_state()
    }
}


struct SensorDataHandler {
    farm_id: String,
    tx: mpsc::Sender<SummaryUpdate>,
}


#[async_trait]
impl MessageHandler for SensorDataHandler {
    async fn handle(&mut self, message: PushMessage) {
        let patch = match decode_sensor_data(&message.body) {
            Ok(patch) => patch,
            Err(e) => {
                warn!("Warning: payload de {} descartado: {}", message.destination, e);
                return;
            }
        };

        if patch.is_empty() {
            debug!("Debug: payload sin campos conocidos en {}", message.destination);
            return;
        }

        let update = SummaryUpdate { farm_id: self.farm_id.clone(), patch };
        match self.tx.try_send(update) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Warning: cola de parches llena, actualización descartada"),
            Err(TrySendError::Closed(_)) => error!("Error: no se pudo enviar el parche al dashboard"),
        }
    }
}
