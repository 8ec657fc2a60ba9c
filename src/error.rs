use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Error, Clone)]
pub enum SessionError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("credential expired, refresh required")]
    AuthExpired,

    #[error("credential invalid, session expired")]
    CredentialInvalid,

    #[error("circuit open, cooling down for {0:?}")]
    CircuitOpen(Duration),

    #[error("gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),

    #[error("room not found: {0}")]
    RoomNotFound(String),

    #[error("message not found: {0}")]
    MessageNotFound(Uuid),
}

impl SessionError {
    /// Terminal errors end the session; everything else is retried per the
    /// reconnect policy or logged and ignored.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::CredentialInvalid
                | SessionError::CircuitOpen(_)
                | SessionError::RetriesExhausted(_)
        )
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::TransientNetwork(_) | SessionError::AuthExpired
        )
    }
}
