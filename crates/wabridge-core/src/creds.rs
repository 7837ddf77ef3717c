//! Durable credential bundle for one account.
//!
//! Serialized as JSON text whose binary fields pass through base64, so
//! the store's textual encoding round-trips raw key material exactly.

use serde::{Deserialize, Serialize};

/// Serde helper: raw bytes as base64 text.
pub mod b64 {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Encode bytes as a base64 string.
    ///
    /// # Errors
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&BASE64.encode(bytes))
    }

    /// Decode a base64 string back into bytes.
    ///
    /// # Errors
    /// Fails on malformed base64.
    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}

/// An asymmetric key pair held as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    #[serde(with = "b64")]
    pub public: Vec<u8>,
    #[serde(with = "b64")]
    pub private: Vec<u8>,
}

/// Account identity reported by the remote once paired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountIdentity {
    /// Full conversation address of the bridged account.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// The durable authentication bundle.
///
/// Created by the protocol client on the first connect attempt and
/// replaced wholesale on every credential-update event; the store
/// write is the commit point for each replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub noise_key: KeyPair,
    pub signed_identity_key: KeyPair,
    pub registration_id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub me: Option<AccountIdentity>,
}

impl Credentials {
    /// Store key the bundle is persisted under.
    pub const STORAGE_KEY: &'static str = "creds";

    /// Serialize into the store's textual blob encoding.
    ///
    /// # Errors
    /// Fails if serialization fails (never for well-formed bundles).
    pub fn to_blob(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Parse a stored blob back into a bundle.
    ///
    /// # Errors
    /// Fails on malformed or truncated blobs.
    pub fn from_blob(blob: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(blob)
    }

    /// Whether the bundle has completed pairing.
    #[must_use]
    pub const fn is_registered(&self) -> bool {
        self.me.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credentials {
        Credentials {
            noise_key: KeyPair {
                public: (0..=255).collect(),
                private: vec![0, 159, 146, 150, 255],
            },
            signed_identity_key: KeyPair {
                public: vec![7; 32],
                private: vec![9; 32],
            },
            registration_id: 0x00ab_cdef,
            me: Some(AccountIdentity {
                id: "15551234567@s.whatsapp.net".into(),
                name: Some("bridge".into()),
            }),
        }
    }

    #[test]
    fn blob_roundtrip_preserves_raw_bytes() {
        let creds = sample();
        let blob = creds.to_blob().unwrap();
        // The encoding is textual JSON, not raw bytes.
        assert!(std::str::from_utf8(&blob).is_ok());
        let back = Credentials::from_blob(&blob).unwrap();
        assert_eq!(back, creds);
        assert_eq!(back.noise_key.public.len(), 256);
    }

    #[test]
    fn unregistered_bundle() {
        let mut creds = sample();
        creds.me = None;
        assert!(!creds.is_registered());
        let back = Credentials::from_blob(&creds.to_blob().unwrap()).unwrap();
        assert!(back.me.is_none());
    }
}
