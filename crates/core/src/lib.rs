//! Core types and shared functionality for ogsnap.
//!
//! This crate provides:
//! - Path-to-key derivation
//! - The content store contract and the local ephemeral backend
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod key;
pub mod store;

pub use config::{AppConfig, ConfigError, StoreBackend};
pub use error::Error;
pub use key::{Key, derive_key, is_root};
pub use store::{ContentStore, EphemeralStore, Presence, ServeInstruction, Snapshot};
