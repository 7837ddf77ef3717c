//! Session store backends.
//!
//! Two deployment variants of the same contract: a filesystem
//! directory (default) and a two-column Postgres table (feature
//! `postgres`), plus an in-memory store for development. All of them
//! round-trip binary blobs exactly.

pub mod fs;

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use fs::FsStore;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

#[cfg(feature = "postgres")]
pub use postgres::PgStore;
