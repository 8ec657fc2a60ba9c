pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod hub;
pub mod logging;
pub mod protocol;

pub use auth::{CredentialCoordinator, CredentialRefresher, HttpCredentialRefresher, RefreshOutcome};
pub use client::{Connection, ConnectionState, Transport};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use hub::{PresenceCounter, RoomHub};
