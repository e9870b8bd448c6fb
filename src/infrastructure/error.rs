use thiserror::Error;

/// Network time correction failures. Tolerated per wake: drift is
/// bounded by the API refresh interval until the next attempt.
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("time sync network error: {0}")]
    Network(String),
    #[error("time sync timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar authorization expired: {0}")]
    AuthExpired(String),
    #[error("calendar network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("calendar server error: {0}")]
    ServerError(String),
    #[error("calendar request timed out")]
    Timeout,
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("corrupt persisted state: {0}")]
    CorruptState(String),
    #[error("state write failed: {0}")]
    WriteFailed(String),
}

/// Boot-time configuration failures; these abort startup rather than a
/// wake pass.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
