//! Canal de notificaciones del usuario.
//!
//! Conexión independiente del canal de granja: se abre cuando se conoce el usuario y se
//! cierra al hacer logout. Cada alerta se decodifica y se despacha a la presentación;
//! no se guarda historial.


use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use crate::context::domain::AppContext;
use crate::message::domain::NotificationMessage;
use crate::message::logic::{decode_notification, user_notification_topic};
use crate::push::domain::{ChannelState, OwnerKey, PushMessage, Subscription};
use crate::push::logic::{MessageHandler, PushChannel};


pub struct NotificationChannel {
    channel: PushChannel,
    tx: mpsc::Sender<NotificationMessage>,
}


impl NotificationChannel {
    pub fn new(tx_to_presentation: mpsc::Sender<NotificationMessage>, app_context: &AppContext) -> Self {
        let channel = PushChannel::new("notifications",
                                       app_context.connector.clone(),
                                       app_context.subscriptions.clone());
        Self { channel, tx: tx_to_presentation }
    }

    pub async fn start(&mut self, user_id: &str) {
        let subscription = Subscription {
            topic: user_notification_topic(user_id),
            owner: OwnerKey::User(user_id.to_string()),
        };
        let handler = NotificationHandler { tx: self.tx.clone() };
        self.channel.start(subscription, handler).await;
    }

    pub async fn stop(&mut self) {
        self.channel.stop().await;
    }

    pub fn state(&self) -> ChannelState {
        self.channel.state()
    }
}


struct NotificationHandler {
    tx: mpsc::Sender<NotificationMessage>,
}


#[async_trait]
impl MessageHandler for NotificationHandler {
    async fn handle(&mut self, message: PushMessage) {
        match decode_notification(&message.body) {
            Ok(notification) => match self.tx.try_send(notification) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Warning: cola de notificaciones llena"),
                Err(TrySendError::Closed(_)) => error!("Error: la presentación ya no recibe notificaciones"),
            },
            Err(e) => warn!("Warning: notificación descartada: {}", e),
        }
    }
}


/// Sigue la identidad del usuario: abre el canal al conocerla y lo cierra en logout.
///
/// Termina cuando el contexto de selección se descarta.
#[instrument(name = "notification_task", skip_all)]
pub async fn run_notifications(mut channel: NotificationChannel,
                               mut user_rx: watch::Receiver<Option<String>>) {

    info!("Info: tarea de notificaciones creada");

    loop {
        let user = user_rx.borrow_and_update().clone();
        match user {
            Some(user_id) => channel.start(&user_id).await,
            None => channel.stop().await,
        }

        if user_rx.changed().await.is_err() {
            break;
        }
    }

    channel.stop().await;
    info!("Info: tarea de notificaciones finalizada");
}


pub fn start_notifications(tx_to_presentation: mpsc::Sender<NotificationMessage>,
                           user_rx: watch::Receiver<Option<String>>,
                           app_context: &AppContext) -> JoinHandle<()> {

    let channel = NotificationChannel::new(tx_to_presentation, app_context);
    tokio::spawn(async move {
        run_notifications(channel, user_rx).await;
    })
}
