//! Core types and utilities for the qoracle modules
//!
//! This crate provides what every oracle submodule shares:
//! - KV stores and the per-cycle execution context
//! - Packet types and the transport contract
//! - Request tracking and packet correlation
//! - Price and pool types, oracle capability traits
//! - Configuration loading and errors

pub mod codec;
pub mod config;
pub mod context;
pub mod correlator;
pub mod errors;
pub mod oracle;
pub mod packets;
pub mod pools;
pub mod prices;
pub mod store;
pub mod tracker;
pub mod types;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use crate::config::*;
pub use context::*;
pub use errors::*;
pub use oracle::*;
pub use packets::*;
pub use pools::*;
pub use prices::*;
pub use store::{KvStore, MultiStore, StoreKind};
pub use tracker::*;
pub use types::*;
