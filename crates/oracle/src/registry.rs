//! Oracle capability registry
//!
//! Sources are registered on a builder which is consumed by `seal()`. The sealed
//! registry has no way to add sources, so registration after startup cannot happen.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use qoracle_core::{PoolOracle, PriceOracle, WiringError, WiringResult};

#[derive(Default)]
pub struct OracleRegistryBuilder {
    price_oracles: Vec<Arc<dyn PriceOracle>>,
    pool_oracles: Vec<Arc<dyn PoolOracle>>,
}

impl OracleRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn price_oracle(mut self, oracle: Arc<dyn PriceOracle>) -> Self {
        self.price_oracles.push(oracle);
        self
    }

    pub fn pool_oracle(mut self, oracle: Arc<dyn PoolOracle>) -> Self {
        self.pool_oracles.push(oracle);
        self
    }

    /// Exactly one price oracle. Pool oracle sources are unique and usable as a
    /// cache key segment (non-empty, no `/`).
    pub fn seal(mut self) -> WiringResult<OracleRegistry> {
        if self.price_oracles.len() != 1 {
            return Err(WiringError::PriceOracleCount(self.price_oracles.len()));
        }

        let mut sources = BTreeSet::new();
        for oracle in &self.pool_oracles {
            let source = oracle.source();
            if source.is_empty() || source.contains('/') {
                return Err(WiringError::InvalidSourceName(source.to_string()));
            }
            if !sources.insert(source.to_string()) {
                return Err(WiringError::DuplicatePoolOracle(source.to_string()));
            }
        }

        let price_oracle = self.price_oracles.remove(0);
        info!(
            price_source = price_oracle.source(),
            pool_sources = ?sources,
            "Sealed oracle registry"
        );
        Ok(OracleRegistry {
            price_oracle,
            pool_oracles: self.pool_oracles,
        })
    }
}

/// Sealed set of price and pool sources
#[derive(Clone)]
pub struct OracleRegistry {
    price_oracle: Arc<dyn PriceOracle>,
    pool_oracles: Vec<Arc<dyn PoolOracle>>,
}

impl OracleRegistry {
    pub fn builder() -> OracleRegistryBuilder {
        OracleRegistryBuilder::new()
    }

    pub fn price_oracle(&self) -> &dyn PriceOracle {
        self.price_oracle.as_ref()
    }

    /// Pool sources in registration order
    pub fn pool_oracles(&self) -> impl Iterator<Item = &dyn PoolOracle> {
        self.pool_oracles.iter().map(|o| o.as_ref())
    }

    pub fn pool_sources(&self) -> Vec<&str> {
        self.pool_oracles.iter().map(|o| o.source()).collect()
    }
}

impl std::fmt::Debug for OracleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleRegistry")
            .field("price_oracle", &self.price_oracle.source())
            .field("pool_oracles", &self.pool_sources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qoracle_core::{Context, CoreResult, DenomPrices, Pool, SymbolPriceList};

    struct Fixed(&'static str);

    impl PriceOracle for Fixed {
        fn source(&self) -> &str {
            self.0
        }

        fn get_symbol_price_list(&self, ctx: &Context) -> CoreResult<SymbolPriceList> {
            Ok(SymbolPriceList::new(ctx.block_time()))
        }
    }

    impl PoolOracle for Fixed {
        fn source(&self) -> &str {
            self.0
        }

        fn get_pools(&self, _ctx: &Context, _prices: &DenomPrices) -> CoreResult<Vec<Pool>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_exactly_one_price_oracle() {
        assert!(matches!(
            OracleRegistry::builder().seal(),
            Err(WiringError::PriceOracleCount(0))
        ));
        assert!(matches!(
            OracleRegistry::builder()
                .price_oracle(Arc::new(Fixed("band")))
                .price_oracle(Arc::new(Fixed("other")))
                .seal(),
            Err(WiringError::PriceOracleCount(2))
        ));
    }

    #[test]
    fn test_duplicate_pool_source() {
        let result = OracleRegistry::builder()
            .price_oracle(Arc::new(Fixed("band")))
            .pool_oracle(Arc::new(Fixed("osmosis")))
            .pool_oracle(Arc::new(Fixed("osmosis")))
            .seal();
        assert!(matches!(result, Err(WiringError::DuplicatePoolOracle(s)) if s == "osmosis"));
    }

    #[test]
    fn test_pool_source_must_be_a_key_segment() {
        let result = OracleRegistry::builder()
            .price_oracle(Arc::new(Fixed("band")))
            .pool_oracle(Arc::new(Fixed("osmosis")))
            .pool_oracle(Arc::new(Fixed("osmosis/1")))
            .seal();
        assert!(matches!(result, Err(WiringError::InvalidSourceName(s)) if s == "osmosis/1"));

        let result = OracleRegistry::builder()
            .price_oracle(Arc::new(Fixed("band")))
            .pool_oracle(Arc::new(Fixed("")))
            .seal();
        assert!(matches!(result, Err(WiringError::InvalidSourceName(_))));
    }

    #[test]
    fn test_sealed_registry() {
        let registry = OracleRegistry::builder()
            .price_oracle(Arc::new(Fixed("band")))
            .pool_oracle(Arc::new(Fixed("osmosis")))
            .pool_oracle(Arc::new(Fixed("other")))
            .seal()
            .unwrap();
        assert_eq!(registry.price_oracle().source(), "band");
        assert_eq!(registry.pool_sources(), vec!["osmosis", "other"]);
    }
}
