//! Wire protocol between the bridge and the protocol sidecar.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wabridge_core::event::{DisconnectCause, KeyMutation};

/// Close code the sidecar uses for an authoritative remote logout.
pub const LOGGED_OUT_CODE: u16 = 401;

/// Message from the bridge to the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// Open the session, resuming from credentials when present.
    Connect {
        #[serde(skip_serializing_if = "Option::is_none")]
        creds: Option<Value>,
        version: [u32; 3],
    },
    /// Ask for a short numeric pairing code.
    RequestPairingCode { id: String, phone: String },
    /// Send a text message to a conversation address.
    SendText { id: String, to: String, text: String },
    /// Close the session.
    Close,
}

/// Message from the sidecar to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    /// Fresh scannable challenge payload.
    Qr { data: String },
    /// Reply to `RequestPairingCode`.
    PairingCode { id: String, code: String },
    /// The credential bundle changed.
    CredsUpdate { creds: Value },
    /// Key-material entries changed.
    KeysUpdate { entries: Vec<WireKeyEntry> },
    /// Authenticated session open.
    Open,
    /// The session closed; final message of a connection.
    Closed {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        reason: String,
    },
    /// Inbound message.
    Message {
        chat: String,
        #[serde(default)]
        participant: Option<String>,
        #[serde(default)]
        from_me: bool,
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        push_name: Option<String>,
    },
    /// Reply to `SendText`.
    SendResult {
        id: String,
        success: bool,
        #[serde(default)]
        error: Option<String>,
    },
}

/// A key-material mutation on the wire; `value` is base64, absent to
/// revoke the entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireKeyEntry {
    pub category: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl WireKeyEntry {
    /// Wrap raw key material for the wire.
    #[must_use]
    pub fn set(category: impl Into<String>, id: impl Into<String>, value: &[u8]) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            value: Some(BASE64.encode(value)),
        }
    }

    /// Mark an entry as no longer trusted.
    #[must_use]
    pub fn revoke(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            value: None,
        }
    }

    /// Decode into the core mutation type.
    ///
    /// # Errors
    /// Fails on malformed base64 payloads.
    pub fn decode(self) -> Result<KeyMutation, base64::DecodeError> {
        let value = self.value.map(|v| BASE64.decode(v)).transpose()?;
        Ok(KeyMutation {
            category: self.category,
            id: self.id,
            value,
        })
    }
}

/// Classify a sidecar close into the lifecycle's disconnect taxonomy.
#[must_use]
pub fn classify_close(code: Option<u16>, reason: &str) -> DisconnectCause {
    if code == Some(LOGGED_OUT_CODE) || reason.eq_ignore_ascii_case("logged out") {
        DisconnectCause::LoggedOut
    } else if reason.is_empty() {
        DisconnectCause::Transient(match code {
            Some(code) => format!("close code {code}"),
            None => "connection lost".to_string(),
        })
    } else {
        DisconnectCause::Transient(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_entry_roundtrip() {
        let original: Vec<u8> = (0..=255).collect();
        let entry = WireKeyEntry::set("pre-key", "7", &original);
        let decoded = entry.decode().unwrap();
        assert_eq!(decoded.storage_key(), "pre-key-7");
        assert_eq!(decoded.value.unwrap(), original);
    }

    #[test]
    fn test_revoked_entry_has_no_value() {
        let decoded = WireKeyEntry::revoke("session", "abc").decode().unwrap();
        assert_eq!(decoded.value, None);
    }

    #[test]
    fn test_message_serialization() {
        let msg = BridgeMessage::SendText {
            id: "r1".into(),
            to: "15551234567@s.whatsapp.net".into(),
            text: "hello".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("send_text"));

        let parsed: BridgeMessage = serde_json::from_str(&json).unwrap();
        if let BridgeMessage::SendText { id, to, text } = parsed {
            assert_eq!(id, "r1");
            assert_eq!(to, "15551234567@s.whatsapp.net");
            assert_eq!(text, "hello");
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_closed_defaults() {
        let parsed: SidecarMessage = serde_json::from_str(r#"{"type":"closed"}"#).unwrap();
        if let SidecarMessage::Closed { code, reason } = parsed {
            assert_eq!(code, None);
            assert_eq!(reason, "");
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_close_classification() {
        assert_eq!(classify_close(Some(401), ""), DisconnectCause::LoggedOut);
        assert_eq!(classify_close(None, "Logged Out"), DisconnectCause::LoggedOut);
        assert_eq!(
            classify_close(Some(503), "stream errored"),
            DisconnectCause::Transient("stream errored".into())
        );
        assert_eq!(
            classify_close(None, ""),
            DisconnectCause::Transient("connection lost".into())
        );
    }
}
