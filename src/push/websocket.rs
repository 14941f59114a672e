use async_trait::async_trait;
use futures_util::SinkExt;
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::time::{sleep_until, timeout, Duration, Instant};
use tokio_stream::StreamExt;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use crate::config::push::{CONNECT_TIMEOUT, HEART_BEAT_MS};
use crate::push::domain::{PushConnector, PushMessage, PushSession};
use crate::stomp::domain::{Command, Frame, HeartBeat, HeartBeatPlan};
use crate::stomp::logic::{decode, encode};
use crate::system::domain::{ErrorType, System};


type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Latido STOMP: un salto de línea suelto.
const HEARTBEAT_EOL: &str = "\n";


/// Abre conexiones STOMP sobre WebSocket autenticadas con Bearer.
#[derive(Clone, Debug)]
pub struct StompConnector {
    ws_url: String,
    host: String,
    token: String,
    heart_beat: HeartBeat,
    connect_timeout: Duration,
}


impl StompConnector {
    pub fn new(system: &System) -> Result<Self, ErrorType> {
        let url = Url::parse(&system.ws_url)
            .map_err(|e| ErrorType::Endpoint(format!("{}: {e}", system.ws_url)))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ErrorType::Endpoint(format!("esquema no soportado: {}", url.scheme())));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ErrorType::Endpoint(format!("{} no tiene host", system.ws_url)))?
            .to_string();

        Ok(Self {
            ws_url: system.ws_url.clone(),
            host,
            token: system.auth_token.clone(),
            heart_beat: HeartBeat::new(HEART_BEAT_MS.0, HEART_BEAT_MS.1),
            connect_timeout: CONNECT_TIMEOUT,
        })
    }

    /// Handshake WebSocket, `CONNECT` y espera de `CONNECTED`.
    async fn handshake(&self) -> Result<StompSession, ErrorType> {
        let (mut ws, _) = connect_async(self.ws_url.as_str()).await?;

        let connect = Frame::connect(&self.host, &self.token, self.heart_beat);
        ws.send(Message::Text(encode(&connect))).await?;

        let connected = loop {
            let frame = read_frame(&mut ws).await?;
            match frame.command {
                Command::Connected => break frame,
                Command::Error => {
                    let _ = ws.close(None).await;
                    return Err(broker_error(&frame));
                }
                other => debug!("Debug: trama {} ignorada antes de CONNECTED", other),
            }
        };

        let server = match connected.get("heart-beat") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                warn!("Warning: {}, latidos desactivados", e);
                HeartBeat::default()
            }),
            None => HeartBeat::default(),
        };
        let plan = self.heart_beat.negotiate(server);

        info!("Info: STOMP conectado (versión {}, latidos {:?})", connected.get("version").unwrap_or("?"), plan);

        let now = Instant::now();
        Ok(StompSession { ws, next_id: 0, plan, last_sent: now, last_received: now })
    }
}


#[async_trait]
impl PushConnector for StompConnector {
    async fn connect(&self) -> Result<Box<dyn PushSession>, ErrorType> {
        match timeout(self.connect_timeout, self.handshake()).await {
            Ok(session) => Ok(Box::new(session?)),
            Err(_) => Err(ErrorType::ChannelFailure(format!(
                "el broker no respondió en {:?}", self.connect_timeout
            ))),
        }
    }
}


struct StompSession {
    ws: WsStream,
    next_id: u64,
    plan: HeartBeatPlan,
    last_sent: Instant,
    last_received: Instant,
}


impl StompSession {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), ErrorType> {
        self.send_text(encode(frame)).await
    }

    async fn send_text(&mut self, text: String) -> Result<(), ErrorType> {
        self.ws.send(Message::Text(text)).await?;
        self.last_sent = Instant::now();
        Ok(())
    }
}


#[async_trait]
impl PushSession for StompSession {
    async fn subscribe(&mut self, topic: &str) -> Result<String, ErrorType> {
        let id = format!("sub-{}", self.next_id);
        self.next_id += 1;
        self.send_frame(&Frame::subscribe(&id, topic)).await?;
        Ok(id)
    }

    async fn unsubscribe(&mut self, subscription_id: &str) -> Result<(), ErrorType> {
        self.send_frame(&Frame::unsubscribe(subscription_id)).await
    }

    /// Espera el próximo `MESSAGE`. Mientras tanto envía latidos y vigila el silencio del broker.
    async fn next_message(&mut self) -> Result<PushMessage, ErrorType> {
        let send_every = self.plan.send_every;
        let silence_limit = self.plan.silence_limit;

        loop {
            let beat_at = self.last_sent + send_every.unwrap_or_default();
            let silent_at = self.last_received + silence_limit.unwrap_or_default();

            let incoming = tokio::select! {
                incoming = self.ws.next() => incoming,

                _ = sleep_until(beat_at), if send_every.is_some() => {
                    self.send_text(HEARTBEAT_EOL.to_string()).await?;
                    continue;
                }

                _ = sleep_until(silent_at), if silence_limit.is_some() => {
                    return Err(ErrorType::ChannelFailure(format!(
                        "sin datos del broker en {:?}", silence_limit.unwrap_or_default()
                    )));
                }
            };

            self.last_received = Instant::now();
            let Some(frame) = frame_from(incoming)? else {
                continue;
            };

            match frame.command {
                Command::Message => {
                    let destination = frame.get("destination").unwrap_or_default().to_string();
                    return Ok(PushMessage { destination, body: frame.body });
                }
                Command::Error => return Err(broker_error(&frame)),
                other => debug!("Debug: trama {} ignorada", other),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.send_frame(&Frame::disconnect()).await {
            debug!("Debug: DISCONNECT no enviado: {}", e);
        }
        if let Err(e) = self.ws.close(None).await {
            debug!("Debug: cierre WebSocket: {}", e);
        }
    }
}


/// Lee la siguiente trama STOMP, saltando latidos y mensajes no textuales.
async fn read_frame(ws: &mut WsStream) -> Result<Frame, ErrorType> {
    loop {
        if let Some(frame) = frame_from(ws.next().await)? {
            return Ok(frame);
        }
    }
}


/// Interpreta un mensaje WebSocket. `Ok(None)` para latidos, control y tramas ilegibles:
/// una trama ilegible no tira abajo la conexión, solo se registra.
fn frame_from(incoming: Option<Result<Message, WsError>>) -> Result<Option<Frame>, ErrorType> {
    match incoming {
        Some(Ok(Message::Text(text))) => match decode(&text) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                warn!("Warning: trama STOMP descartada: {}", e);
                Ok(None)
            }
        },
        Some(Ok(Message::Close(reason))) => {
            Err(ErrorType::ChannelFailure(format!("cerrado por el servidor: {reason:?}")))
        }
        Some(Ok(_)) => Ok(None),
        Some(Err(e)) => Err(e.into()),
        None => Err(ErrorType::ChannelFailure("stream cerrado".into())),
    }
}


fn broker_error(frame: &Frame) -> ErrorType {
    let detail = frame.get("message").unwrap_or(frame.body.as_str());
    ErrorType::ChannelFailure(format!("ERROR del broker: {detail}"))
}
