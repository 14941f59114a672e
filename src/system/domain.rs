//! Módulo de configuración central y gestión del entorno de ejecución.
//!
//! Este módulo actúa como la fuente única de verdad para la configuración de la aplicación.
//! Se encarga de leer las variables de entorno, establecer valores por defecto seguros
//! y proveer las estructuras necesarias para iniciar los subsistemas (API REST, canal push, Logging).
//!
//! # Funcionalidades Principales
//! * **Carga de Configuración:** Lee de `.env` en desarrollo y variables de sistema en producción.
//! * **Observabilidad:** Configura `tracing_subscriber` para logs estructurados o legibles.
//! * **Errores:** Define la taxonomía de errores operativos (`ErrorType`).
//!


use std::env;
use std::str::FromStr;
use chrono_tz::Tz;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};


/// Representa la configuración global del sistema y el estado del entorno.
#[derive(Debug, Clone)]
pub struct System {
    /// URL base de la API REST (ej. `https://farm.example.com/api`).
    /// **Requerido**.
    pub api_base_url: String,

    /// URL del endpoint WebSocket que habla STOMP (ej. `wss://farm.example.com/ws/websocket`).
    /// **Requerido**.
    pub ws_url: String,

    /// Credencial Bearer entregada por el colaborador de autenticación.
    /// **Requerido**.
    pub auth_token: String,

    /// Granja activa al iniciar. Opcional.
    pub farm_id: Option<String>,

    /// Usuario autenticado. Si falta, el canal de notificaciones no se abre.
    pub user_id: Option<String>,

    /// Zona horaria usada para formatear las etiquetas del gráfico.
    /// Por defecto: `UTC`.
    pub display_timezone: Tz,

    /// Timeout de cada consulta HTTP en segundos.
    /// Por defecto: `10`.
    pub http_timeout_secs: u64,

    /// Entorno de ejecución actual (`development`, `staging`, `production`).
    pub environment: String,

    /// Nivel de detalle de los logs (ej. `info`, `debug`, `warn`).
    /// Se autoconfigura según el `environment` si no se especifica.
    pub rust_log: String,
}


impl System {

    /// Carga la configuración desde las variables de entorno.
    ///
    /// # Comportamiento
    /// * Si `ENVIRONMENT` es "development", intenta cargar un archivo `.env`.
    /// * Establece valores por defecto para variables opcionales.
    ///
    /// # Errores
    /// * `ErrorType::Config` si falta una variable requerida o un valor no es válido.
    pub fn new() -> Result<Self, ErrorType> {

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".into());

        if environment == "development" {
            dotenv::dotenv().ok();
        }

        let display_timezone = optional("DISPLAY_TIMEZONE")
            .unwrap_or_else(|| "UTC".to_string())
            .parse::<Tz>()
            .map_err(|_| ErrorType::Config("DISPLAY_TIMEZONE no es una zona IANA válida".into()))?;

        let system = System {
            api_base_url: required("API_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            ws_url: required("WS_URL")?,
            auth_token: required("AUTH_TOKEN")?,
            farm_id: optional("FARM_ID"),
            user_id: optional("USER_ID"),
            display_timezone,
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS", 10)?,
            rust_log: env::var("RUST_LOG")
                .unwrap_or_else(|_| {
                    match environment.as_str() {
                        "development" => "debug".to_string(),
                        "staging" => "info".to_string(),
                        _ => "warn".to_string(),
                    }
                }),
            environment,
        };

        Ok(system)
    }
}


fn required(key: &str) -> Result<String, ErrorType> {
    optional(key).ok_or_else(|| ErrorType::Config(format!("{key} no está configurada")))
}


fn optional(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}


fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, ErrorType> {
    match optional(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ErrorType::Config(format!("{key} debe ser un número"))),
        None => Ok(default),
    }
}


/// Categorización de errores operativos del sistema.
///
/// * `TransientFetch`: la consulta REST falló; se conserva el último dato bueno.
/// * `MalformedMessage`: un payload push no se pudo decodificar; se descarta.
/// * `ChannelFailure`: la conexión push cayó; se reconecta tras el retardo fijo.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ErrorType {
    #[error("configuración inválida: {0}")]
    Config(String),

    #[error("endpoint inválido: {0}")]
    Endpoint(String),

    #[error("fallo en la consulta: {0}")]
    TransientFetch(String),

    #[error("mensaje mal formado: {0}")]
    MalformedMessage(String),

    #[error("fallo del canal push: {0}")]
    ChannelFailure(String),
}


impl From<reqwest::Error> for ErrorType {
    fn from(e: reqwest::Error) -> Self {
        ErrorType::TransientFetch(e.to_string())
    }
}


impl From<serde_json::Error> for ErrorType {
    fn from(e: serde_json::Error) -> Self {
        ErrorType::MalformedMessage(e.to_string())
    }
}


impl From<tokio_tungstenite::tungstenite::Error> for ErrorType {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ErrorType::ChannelFailure(e.to_string())
    }
}


/// Inicializa el sistema de trazabilidad y logs (Tracing).
///
/// Configura el formato de salida basándose en el entorno:
/// * **Production**: Salida JSON (para logs estructurados en la nube).
/// * **Development/Otros**: Salida "Pretty" (colores y formato legible).
pub fn init_tracing(system: &System) {

    let filter = EnvFilter::try_new(&system.rust_log)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(false);

    if system.environment == "production" {
        builder.json().init();
    } else {
        builder.pretty().init();
    }
}


#[cfg(test)]
pub fn test_system() -> System {
    System {
        api_base_url: "http://localhost:8080/api".into(),
        ws_url: "ws://localhost:8080/ws/websocket".into(),
        auth_token: "token".into(),
        farm_id: None,
        user_id: None,
        display_timezone: Tz::UTC,
        http_timeout_secs: 10,
        environment: "test".into(),
        rust_log: "debug".into(),
    }
}
