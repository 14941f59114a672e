pub mod aggregation {
    /// Ventana de agregación fija que se pide al backend.
    pub const WINDOW: &str = "10m";
    /// Formato de la etiqueta de tiempo de cada fila del gráfico.
    pub const LABEL_FORMAT: &str = "%H:%M";
}


pub mod push {
    use tokio::time::Duration;

    pub const RETRY_DELAY: Duration = Duration::from_secs(5);
    /// Tiempo máximo para desuscribir y cerrar al desmontar un canal.
    pub const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(2);
    /// Límite para el handshake WebSocket más la espera de `CONNECTED`.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const STOMP_VERSION: &str = "1.2";
    /// Latidos ofrecidos al broker en ms (envío, recepción).
    pub const HEART_BEAT_MS: (u64, u64) = (10_000, 10_000);
    /// Silencio tolerado, en múltiplos del intervalo de recepción acordado.
    pub const HEART_BEAT_TOLERANCE: u32 = 2;
}


pub mod channels {
    pub const COMMAND_CAPACITY: usize = 32;
    pub const UPDATE_CAPACITY: usize = 200;
    pub const COMPLETION_CAPACITY: usize = 32;
    pub const NOTIFICATION_CAPACITY: usize = 50;
}
