use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use tokio::sync::mpsc;
use crate::push::domain::{PushConnector, PushMessage, PushSession};
use crate::system::domain::ErrorType;


/// Broker en memoria: registra cada operación y deja inyectar mensajes en la última sesión.
#[derive(Default)]
pub struct FakeConnector {
    log: Arc<Mutex<Vec<String>>>,
    connects: AtomicUsize,
    failures_left: AtomicUsize,
    sessions: Mutex<Vec<mpsc::UnboundedSender<PushMessage>>>,
}


impl FakeConnector {
    pub fn fail_next_connects(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Entrega un mensaje en la sesión abierta más reciente.
    pub fn push(&self, destination: &str, body: &str) -> bool {
        let sessions = self.sessions.lock().unwrap();
        match sessions.last() {
            Some(tx) => tx
                .send(PushMessage { destination: destination.into(), body: body.into() })
                .is_ok(),
            None => false,
        }
    }

    /// Corta la sesión más reciente como si el servidor cerrara el stream.
    pub fn drop_session(&self) {
        self.sessions.lock().unwrap().pop();
    }
}


#[async_trait]
impl PushConnector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn PushSession>, ErrorType> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("connect".into());

        let pending = self.failures_left.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures_left.store(pending - 1, Ordering::SeqCst);
            return Err(ErrorType::ChannelFailure("connection refused".into()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.lock().unwrap().push(tx);
        Ok(Box::new(FakeSession { log: self.log.clone(), rx }))
    }
}


struct FakeSession {
    log: Arc<Mutex<Vec<String>>>,
    rx: mpsc::UnboundedReceiver<PushMessage>,
}


#[async_trait]
impl PushSession for FakeSession {
    async fn subscribe(&mut self, topic: &str) -> Result<String, ErrorType> {
        self.log.lock().unwrap().push(format!("subscribe {topic}"));
        Ok("sub-0".into())
    }

    async fn unsubscribe(&mut self, subscription_id: &str) -> Result<(), ErrorType> {
        self.log.lock().unwrap().push(format!("unsubscribe {subscription_id}"));
        Ok(())
    }

    async fn next_message(&mut self) -> Result<PushMessage, ErrorType> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| ErrorType::ChannelFailure("stream cerrado".into()))
    }

    async fn close(&mut self) {
        self.log.lock().unwrap().push("close".into());
    }
}
