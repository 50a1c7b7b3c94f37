//! Osmosis pools submodule
//!
//! Reads osmosis chain state through interchain queries and serves the incentivized
//! balancer pools, with TVL and APY, as a pool source of the oracle.

pub mod keeper;
pub mod metrics;
pub mod proto;
pub mod queries;
pub mod types;

pub use keeper::OsmosisKeeper;
pub use queries::RequestKind;
pub use types::{Params, PORT_ID};
