//! Connector implementation backed by an out-of-process protocol
//! sidecar.
//!
//! The sidecar owns the wire/cryptographic protocol of the messaging
//! network; this crate speaks a small JSON protocol to it over a
//! WebSocket and adapts that into the `Connector`/`LiveConnection`
//! seam of `wabridge-core`.

pub mod client;
pub mod protocol;
pub mod version;

pub use client::{GatewayConfig, WsConnector};
