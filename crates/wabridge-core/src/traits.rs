//! Seams between the lifecycle core and its collaborators.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{creds::Credentials, event::ClientEvent};

/// Storage error.
///
/// Absence of a key is not an error; `read` reports it as `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored value is corrupt: {0}")]
    Corrupt(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable key/value persistence for one session namespace.
///
/// All operations are idempotent at the key level. A failed `read`
/// means the store is unreachable or corrupt; callers must not treat
/// it as absence and fabricate a fresh identity from it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read a value; absence is `Ok(None)`.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Upsert a value: a write on an existing key is a full replace.
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Remove a key; removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Remove every key in the session namespace.
    async fn clear(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl SessionStore for std::sync::Arc<dyn SessionStore> {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        (**self).write(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}

/// Connect error.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("remote protocol error: {0}")]
    Protocol(String),
    #[error("connection closed")]
    Closed,
}

/// Per-message send error; reported to the caller, never fatal to the
/// connection.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    #[error("send rejected: {0}")]
    Rejected(String),
    #[error("connection closed")]
    Closed,
}

/// Protocol-version descriptor advertised by the remote network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u32, pub u32, pub u32);

/// Cached descriptor used when the best-effort fetch fails.
pub const DEFAULT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion(2, 3000, 0);

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0, self.1, self.2)
    }
}

/// A single open connection to the remote network.
///
/// Exactly zero or one exists at any time; the connection manager owns
/// it and must close it before opening a replacement.
#[async_trait]
pub trait LiveConnection: Send + Sync + 'static {
    /// Request a short numeric pairing code for out-of-band pairing.
    async fn request_pairing_code(&self, phone: &str) -> Result<String, ConnectError>;

    /// Send a text message to a conversation address.
    async fn send_text(&self, to: &str, text: &str) -> Result<(), SendError>;

    /// Close the connection and release its resources.
    async fn close(&mut self);
}

/// Factory for live connections: the seam to the external client
/// library that implements the wire protocol.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: LiveConnection;

    /// Open a connection, resuming from stored credentials when given.
    ///
    /// Returns the handle and the stream of events it will emit. The
    /// stream ends only after a `Closed` event; a stream that ends
    /// without one is treated as a transient closure by the consumer.
    async fn connect(
        &self,
        creds: Option<Credentials>,
        version: ProtocolVersion,
    ) -> Result<(Self::Conn, mpsc::Receiver<ClientEvent>), ConnectError>;

    /// Latest protocol-version descriptor known to the remote network.
    /// Best effort; callers fall back to the cached descriptor.
    async fn latest_version(&self) -> Result<ProtocolVersion, ConnectError>;
}
