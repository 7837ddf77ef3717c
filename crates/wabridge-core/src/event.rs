//! Typed events emitted by a live connection.
//!
//! The connection manager consumes these from a single queue; nothing
//! else reacts to the raw client callbacks directly.

use crate::creds::Credentials;

/// Event surfaced by the live connection handle.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The remote issued a fresh scannable challenge payload.
    QrIssued(String),
    /// The credential bundle changed and must be persisted before the
    /// update is considered applied.
    CredsUpdate(Credentials),
    /// Key-material entries were created, replaced or revoked.
    KeysUpdate(Vec<KeyMutation>),
    /// The remote confirmed an authenticated session.
    Opened,
    /// An inbound message arrived.
    Message(InboundMessage),
    /// The connection closed; always the final event of a handle.
    Closed(DisconnectCause),
}

/// Why a live connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectCause {
    /// Authoritative remote revocation: wipe credentials, pair afresh.
    LoggedOut,
    /// Anything else: retry with the current session intact.
    Transient(String),
}

impl DisconnectCause {
    #[must_use]
    pub const fn is_logged_out(&self) -> bool {
        matches!(self, Self::LoggedOut)
    }
}

/// A single change to the key-material mapping.
///
/// `value: None` revokes the entry ("no longer trusted", not pending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMutation {
    pub category: String,
    pub id: String,
    pub value: Option<Vec<u8>>,
}

impl KeyMutation {
    /// The store key this entry lives under.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}-{}", self.category, self.id)
    }
}

/// An inbound message event.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Conversation address the message belongs to (reply target).
    pub chat: String,
    /// Address of the actual sender (differs from `chat` in groups).
    pub sender: String,
    /// Whether the bridged account itself authored the message.
    pub from_me: bool,
    /// Extractable text body, if any.
    pub text: Option<String>,
    /// Display name advertised by the sender.
    pub push_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_mutation_storage_key() {
        let m = KeyMutation {
            category: "pre-key".into(),
            id: "42".into(),
            value: Some(vec![1, 2, 3]),
        };
        assert_eq!(m.storage_key(), "pre-key-42");
    }
}
