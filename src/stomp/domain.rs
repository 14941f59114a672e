use std::fmt;
use std::str::FromStr;
use tokio::time::Duration;
use crate::config::push::{HEART_BEAT_TOLERANCE, STOMP_VERSION};
use crate::system::domain::ErrorType;


/// Comandos STOMP 1.2 usados por el cliente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Disconnect,
    Message,
    Receipt,
    Error,
}


impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT y CONNECTED no escapan sus cabeceras.
    pub fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}


impl FromStr for Command {
    type Err = ErrorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" | "STOMP" => Ok(Command::Connect),
            "CONNECTED" => Ok(Command::Connected),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "DISCONNECT" => Ok(Command::Disconnect),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            other => Err(ErrorType::MalformedMessage(format!("comando STOMP desconocido: {other}"))),
        }
    }
}


impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}


/// Trama STOMP: comando, cabeceras en orden y cuerpo de texto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}


impl Frame {
    pub fn new(command: Command) -> Self {
        Self { command, headers: Vec::new(), body: String::new() }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Valor de una cabecera. Si se repite, gana la primera aparición.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn connect(host: &str, token: &str, heart_beat: HeartBeat) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", STOMP_VERSION)
            .header("host", host)
            .header("heart-beat", &heart_beat.to_string())
            .header("Authorization", &format!("Bearer {token}"))
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }
}


/// Cabecera `heart-beat`: milisegundos entre envíos y entre recepciones esperadas.
/// `0` desactiva ese sentido.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    pub outgoing_ms: u64,
    pub incoming_ms: u64,
}


/// Latidos efectivos de una sesión.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeatPlan {
    /// Cada cuánto enviar un latido si no se envió otra cosa.
    pub send_every: Option<Duration>,
    /// Silencio máximo del broker antes de dar la conexión por caída.
    pub silence_limit: Option<Duration>,
}


impl HeartBeat {
    pub const fn new(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self { outgoing_ms, incoming_ms }
    }

    /// Combina lo ofrecido por el cliente (`self`) con lo anunciado por el servidor en `CONNECTED`.
    pub fn negotiate(&self, server: HeartBeat) -> HeartBeatPlan {
        let send_every = (self.outgoing_ms > 0 && server.incoming_ms > 0)
            .then(|| Duration::from_millis(self.outgoing_ms.max(server.incoming_ms)));

        let silence_limit = (self.incoming_ms > 0 && server.outgoing_ms > 0)
            .then(|| Duration::from_millis(self.incoming_ms.max(server.outgoing_ms)) * HEART_BEAT_TOLERANCE);

        HeartBeatPlan { send_every, silence_limit }
    }
}


impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing_ms, self.incoming_ms)
    }
}


impl FromStr for HeartBeat {
    type Err = ErrorType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ErrorType::MalformedMessage(format!("heart-beat inválido: {s}"));
        let (outgoing, incoming) = s.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            outgoing_ms: outgoing.trim().parse().map_err(|_| invalid())?,
            incoming_ms: incoming.trim().parse().map_err(|_| invalid())?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiation_takes_the_slower_side() {
        let client = HeartBeat::new(10_000, 10_000);
        let plan = client.negotiate("4000,20000".parse().unwrap());

        assert_eq!(plan.send_every, Some(Duration::from_secs(20)));
        assert_eq!(plan.silence_limit, Some(Duration::from_secs(10) * HEART_BEAT_TOLERANCE));
    }

    #[test]
    fn zero_on_either_side_disables_that_direction() {
        let client = HeartBeat::new(10_000, 10_000);
        assert_eq!(client.negotiate(HeartBeat::default()), HeartBeatPlan::default());

        let plan = client.negotiate(HeartBeat::new(0, 5_000));
        assert_eq!(plan.send_every, Some(Duration::from_secs(10)));
        assert_eq!(plan.silence_limit, None);
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!("10000".parse::<HeartBeat>().is_err());
        assert!("a,b".parse::<HeartBeat>().is_err());
        assert_eq!("0, 0".parse::<HeartBeat>().unwrap(), HeartBeat::default());
    }
}
