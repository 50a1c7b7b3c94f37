//! Bandchain oracle submodule
//!
//! Requests coin rates from a Bandchain oracle script over IBC and exposes the
//! result as the symbol price list of the oracle.

pub mod keeper;
pub mod obi;
pub mod types;

pub use keeper::BandchainKeeper;
pub use types::{CoinRatesParams, OracleScriptParams, Params, PORT_ID};
