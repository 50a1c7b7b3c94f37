//! Capabilities a submodule registers with the oracle

use crate::context::Context;
use crate::pools::Pool;
use crate::prices::{DenomPrices, SymbolPriceList};
use crate::CoreResult;

/// Source of symbol prices. Exactly one is registered.
pub trait PriceOracle: Send + Sync {
    fn source(&self) -> &str;

    /// Latest prices, or an error when none are usable (missing, expired)
    fn get_symbol_price_list(&self, ctx: &Context) -> CoreResult<SymbolPriceList>;
}

/// Source of pools. Any number may be registered, each under a distinct source name.
pub trait PoolOracle: Send + Sync {
    fn source(&self) -> &str;

    /// Pools with metrics computed against `prices`, the price cache as just rebuilt
    fn get_pools(&self, ctx: &Context, prices: &DenomPrices) -> CoreResult<Vec<Pool>>;
}
