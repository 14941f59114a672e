//! Ciclo de vida de una suscripción push.
//!
//! Cada `PushChannel` posee como máximo una conexión abierta. La tarea de fondo sigue la
//! máquina de estados `Init → Work → (error) Error → Init`, con un retardo fijo entre
//! intentos. `start` cierra la suscripción anterior antes de abrir la nueva y `stop`
//! no retorna hasta que la conexión quedó desuscripta y cerrada.


use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, info, instrument, warn};
use crate::config::push::{RETRY_DELAY, TEARDOWN_TIMEOUT};
use crate::push::domain::{ChannelState, PushConnector, PushMessage, PushSession, Subscription, SubscriptionRegistry};
use crate::system::domain::ErrorType;


#[derive(Debug, Clone, Copy, PartialEq)]
enum StateClient {
    Init,
    Work,
    Error,
}


/// Consumidor de los mensajes de una suscripción.
///
/// No debe bloquear: la tarea del canal no atiende el pedido de parada mientras
/// el handler se ejecuta.
#[async_trait]
pub trait MessageHandler: Send + 'static {
    async fn handle(&mut self, message: PushMessage);
}


struct ActiveSubscription {
    subscription: Subscription,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}


pub struct PushChannel {
    name: &'static str,
    connector: Arc<dyn PushConnector>,
    registry: SubscriptionRegistry,
    retry_delay: Duration,
    state_tx: Arc<watch::Sender<ChannelState>>,
    active: Option<ActiveSubscription>,
}


impl PushChannel {
    pub fn new(name: &'static str,
               connector: Arc<dyn PushConnector>,
               registry: SubscriptionRegistry) -> Self {
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        Self {
            name,
            connector,
            registry,
            retry_delay: RETRY_DELAY,
            state_tx: Arc::new(state_tx),
            active: None,
        }
    }

    #[cfg(test)]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn state(&self) -> ChannelState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    pub fn subscription(&self) -> Option<&Subscription> {
        self.active.as_ref().map(|a| &a.subscription)
    }

    /// Abre la suscripción pedida. Si ya está activa no hace nada; si hay otra, la cierra antes.
    pub async fn start<H: MessageHandler>(&mut self, subscription: Subscription, handler: H) {
        if self.subscription() == Some(&subscription) {
            debug!("Debug: canal {} ya suscripto a {}", self.name, subscription.topic);
            return;
        }
        self.stop().await;

        info!("Info: canal {} iniciando para {}", self.name, subscription.owner);

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = SubscriptionWorker {
            name: self.name,
            connector: self.connector.clone(),
            registry: self.registry.clone(),
            subscription: subscription.clone(),
            retry_delay: self.retry_delay,
            state_tx: self.state_tx.clone(),
        };

        let task = tokio::spawn(async move {
            worker.run(handler, shutdown_rx).await;
        });

        self.active = Some(ActiveSubscription { subscription, shutdown: shutdown_tx, task });
    }

    /// Desuscribe y cierra la conexión actual. Idempotente.
    pub async fn stop(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        info!("Info: canal {} deteniendo {}", self.name, active.subscription.owner);
        let _ = active.shutdown.send(());

        if let Err(e) = active.task.await {
            error!("Error: la tarea del canal {} terminó con error: {}", self.name, e);
        }
    }
}


impl Drop for PushChannel {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.shutdown.send(());
        }
    }
}


struct SubscriptionWorker {
    name: &'static str,
    connector: Arc<dyn PushConnector>,
    registry: SubscriptionRegistry,
    subscription: Subscription,
    retry_delay: Duration,
    state_tx: Arc<watch::Sender<ChannelState>>,
}


impl SubscriptionWorker {

    #[instrument(
        name = "push_subscription_task",
        skip_all,
        fields(channel = self.name, owner = %self.subscription.owner)
    )]
    async fn run<H: MessageHandler>(self, mut handler: H, mut shutdown: oneshot::Receiver<()>) {

        let mut state = StateClient::Init;
        let mut session: Option<(Box<dyn PushSession>, String)> = None;

        loop {
            match state {
                StateClient::Init => {
                    self.state_tx.send_replace(ChannelState::Connecting);

                    tokio::select! {
                        _ = &mut shutdown => break,

                        opened = self.open() => {
                            match opened {
                                Ok(open_session) => {
                                    info!("Info: suscripto a {}", self.subscription.topic);
                                    session = Some(open_session);
                                    self.state_tx.send_replace(ChannelState::Connected);
                                    state = StateClient::Work;
                                }
                                Err(e) => {
                                    error!("Error: no se pudo abrir el canal {}: {}", self.name, e);
                                    state = StateClient::Error;
                                }
                            }
                        }
                    }
                }

                StateClient::Work => {
                    let Some((open_session, _)) = session.as_mut() else {
                        warn!("Warning: Estado Work sin sesión válida, reiniciando...");
                        state = StateClient::Init;
                        continue;
                    };

                    tokio::select! {
                        _ = &mut shutdown => break,

                        incoming = open_session.next_message() => {
                            match incoming {
                                Ok(message) => handler.handle(message).await,
                                Err(e) => {
                                    error!("Error: canal {} caído: {}", self.name, e);
                                    state = StateClient::Error;
                                }
                            }
                        }
                    }
                }

                StateClient::Error => {
                    // La sesión rota no admite UNSUBSCRIBE; solo se cierra.
                    self.release(session.take(), false).await;
                    self.state_tx.send_replace(ChannelState::Connecting);

                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = sleep(self.retry_delay) => state = StateClient::Init,
                    }
                }
            }
        }

        self.release(session.take(), true).await;
        self.state_tx.send_replace(ChannelState::Disconnected);
        info!("Info: canal {} desconectado", self.name);
    }

    async fn open(&self) -> Result<(Box<dyn PushSession>, String), ErrorType> {
        if self.registry.is_active(&self.subscription) {
            return Err(ErrorType::ChannelFailure(format!(
                "{} ya tiene una suscripción viva a {}", self.subscription.owner, self.subscription.topic
            )));
        }

        let mut session = self.connector.connect().await?;

        let subscription_id = match session.subscribe(&self.subscription.topic).await {
            Ok(id) => id,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };

        if !self.registry.try_register(&self.subscription, &subscription_id) {
            let _ = session.unsubscribe(&subscription_id).await;
            session.close().await;
            return Err(ErrorType::ChannelFailure(format!(
                "suscripción duplicada para {}", self.subscription.owner
            )));
        }

        Ok((session, subscription_id))
    }

    async fn release(&self, session: Option<(Box<dyn PushSession>, String)>, unsubscribe: bool) {
        let Some((mut open_session, subscription_id)) = session else {
            return;
        };

        let closing = async {
            if unsubscribe {
                if let Err(e) = open_session.unsubscribe(&subscription_id).await {
                    warn!("Warning: no se pudo desuscribir {}: {}", subscription_id, e);
                }
            }
            open_session.close().await;
        };

        if timeout(TEARDOWN_TIMEOUT, closing).await.is_err() {
            warn!("Warning: cierre del canal {} excedió el tiempo límite", self.name);
        }

        self.registry.release(&self.subscription);
    }
}
