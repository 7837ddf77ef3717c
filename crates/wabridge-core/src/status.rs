//! Observable connection lifecycle state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection status of the single managed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Process started, no connect attempt made yet.
    Initializing,
    /// A connect attempt is in flight.
    Connecting,
    /// Waiting for a QR scan to authorize a fresh session.
    Scanning,
    /// Waiting for a pairing-code entry on the paired phone.
    Pairing,
    /// Authenticated session open; message relay is active.
    Connected,
    /// Transient disconnect; a retry is scheduled and credentials kept.
    Reconnecting,
    /// Remote revoked the session; credentials wiped, fresh pairing next.
    LoggedOut,
    /// The connect sequence failed before a handle existed.
    Error,
    /// Explicitly reset; the next attempt is scheduled.
    Disconnected,
}

impl ConnectionStatus {
    /// Stable string form, matching the serde encoding.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Scanning => "scanning",
            Self::Pairing => "pairing",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::LoggedOut => "logged_out",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        }
    }

    /// Whether a pairing artifact may be published in this state.
    #[must_use]
    pub const fn accepts_pairing_artifact(self) -> bool {
        matches!(self, Self::Scanning | Self::Pairing)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The artifact a user needs to authorize a new session.
///
/// At most one exists at a time, and only while the status is
/// `Scanning` or `Pairing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingArtifact {
    /// Scannable challenge, rendered as a `data:` URL image.
    Qr(String),
    /// Short numeric code to type on the paired phone.
    Code(String),
}

impl PairingArtifact {
    /// The QR data URL, if this is a scan artifact.
    #[must_use]
    pub fn qr(&self) -> Option<&str> {
        match self {
            Self::Qr(url) => Some(url),
            Self::Code(_) => None,
        }
    }

    /// The numeric code, if this is a code artifact.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Code(code) => Some(code),
            Self::Qr(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ConnectionStatus::LoggedOut).unwrap();
        assert_eq!(json, "\"logged_out\"");
        assert_eq!(ConnectionStatus::LoggedOut.to_string(), "logged_out");
    }

    #[test]
    fn artifact_only_in_pairing_states() {
        assert!(ConnectionStatus::Scanning.accepts_pairing_artifact());
        assert!(ConnectionStatus::Pairing.accepts_pairing_artifact());
        assert!(!ConnectionStatus::Connected.accepts_pairing_artifact());
        assert!(!ConnectionStatus::Reconnecting.accepts_pairing_artifact());
    }
}
