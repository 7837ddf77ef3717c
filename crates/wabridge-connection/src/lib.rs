//! Connection lifecycle management.
//!
//! The `ConnectionManager` actor owns the single live connection and
//! runs the reconnect/pairing state machine; everything else observes
//! its published state through a `ManagerHandle`.

pub mod backoff;
pub mod manager;
pub mod qr;
pub mod relay;

pub use manager::{ConnectionManager, ManagerConfig, ManagerError, ManagerHandle, StatusSnapshot};
