//! Qoracle: price and pool oracle
//!
//! Aggregates symbol prices from a single price source (Bandchain) and pools from any
//! number of pool sources (Osmosis) into memory-store caches served to other modules.

pub mod genesis;
pub mod keeper;
pub mod module;
pub mod registry;
pub mod types;

pub use genesis::{export_genesis, init_genesis, GenesisConfig};
pub use keeper::QOracleKeeper;
pub use module::QOracleModule;
pub use registry::{OracleRegistry, OracleRegistryBuilder};
pub use types::Params;
