use crate::error::SessionError;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

pub mod connection;

pub use connection::Connection;

/// Lifecycle of one logical client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Terminal; no further automatic transitions
    Closed,
}

/// Last-failure classification driving the reconnect path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Server signaled an invalid or expired credential
    Auth,
    Network,
    Unknown,
}

/// Transport-level failure as surfaced by the underlying transport library.
#[derive(Debug, Error, Clone)]
pub enum ConnectError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("transport error: {0}")]
    Unknown(String),
}

impl ConnectError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ConnectError::Auth(_) => FailureKind::Auth,
            ConnectError::Network(_) => FailureKind::Network,
            ConnectError::Unknown(_) => FailureKind::Unknown,
        }
    }
}

/// Lift a transport failure into the session error taxonomy. Both targets
/// are retryable; terminal errors only arise from refresh outcomes or the
/// reconnect policy, never directly from the transport.
impl From<ConnectError> for SessionError {
    fn from(e: ConnectError) -> Self {
        match e {
            ConnectError::Auth(_) => SessionError::AuthExpired,
            ConnectError::Network(detail) | ConnectError::Unknown(detail) => {
                SessionError::TransientNetwork(detail)
            }
        }
    }
}

/// Handle to one live transport session.
///
/// The transport resolves `closed()` with the disconnect reason when the
/// session drops; dropping the sender half counts as a network-level loss.
pub struct TransportSession {
    closed_rx: oneshot::Receiver<ConnectError>,
}

impl TransportSession {
    /// Create a session handle plus the sender the transport uses to report
    /// the eventual disconnect.
    pub fn channel() -> (oneshot::Sender<ConnectError>, Self) {
        let (tx, closed_rx) = oneshot::channel();
        (tx, Self { closed_rx })
    }

    pub async fn closed(self) -> ConnectError {
        self.closed_rx
            .await
            .unwrap_or_else(|_| ConnectError::Network("transport dropped".into()))
    }
}

/// Physical transport seam. Connect/disconnect/connect-error events come
/// from the implementation; the reconnect machine never drives sockets
/// directly.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<TransportSession, ConnectError>;
}
