//! Qoracle keeper: denom mappings and the memory-store price and pool caches
//!
//! The caches are derived data. They are rebuilt at the end of a cycle in which a
//! submodule reported new data through the context update flags, and once after every
//! restart.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use qoracle_core::{
    rank_by_apy, rank_by_tvl, CachedPool, Context, CoreError, CoreResult, DenomPrices, DenomSymbolMapping, Event,
    PoolFilter, StoreKind,
};

use crate::registry::OracleRegistry;
use crate::types::*;

const LOG_TARGET: &str = "x/qoracle";

#[derive(Debug, Clone)]
pub struct QOracleKeeper {
    registry: OracleRegistry,
}

impl QOracleKeeper {
    pub fn new(registry: OracleRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OracleRegistry {
        &self.registry
    }

    pub fn params(&self, ctx: &Context) -> CoreResult<Params> {
        Ok(ctx.store().get(PARAMS_KEY)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &Params) -> CoreResult<()> {
        params.validate()?;
        ctx.store_mut().set(PARAMS_KEY, params)
    }

    fn ensure_authority(&self, ctx: &Context, sender: &str) -> CoreResult<()> {
        let authority = self.params(ctx)?.authority;
        if authority != sender {
            return Err(CoreError::Unauthorized {
                expected: authority,
                actual: sender.to_string(),
            });
        }
        Ok(())
    }

    // Denom symbol mappings

    pub fn denom_mappings(&self, ctx: &Context) -> CoreResult<Vec<DenomSymbolMapping>> {
        ctx.store().prefix_values(DENOM_MAPPING_PREFIX)
    }

    pub fn denom_mapping(&self, ctx: &Context, denom: &str) -> CoreResult<Option<DenomSymbolMapping>> {
        ctx.store().get(&denom_mapping_key(denom))
    }

    /// Write a mapping without the authority check. Genesis only.
    pub(crate) fn set_denom_mapping_unchecked(&self, ctx: &mut Context, mapping: &DenomSymbolMapping) -> CoreResult<()> {
        mapping.validate()?;
        ctx.store_mut().set(denom_mapping_key(&mapping.denom), mapping)
    }

    /// Add or replace a mapping. Prices are rebuilt at the end of the cycle.
    pub fn add_denom_mapping(&self, ctx: &mut Context, sender: &str, mapping: DenomSymbolMapping) -> CoreResult<()> {
        self.ensure_authority(ctx, sender)?;
        self.set_denom_mapping_unchecked(ctx, &mapping)?;
        ctx.flags.price_dirty = true;
        ctx.emit(
            Event::new(EVENT_TYPE_DENOM_MAPPING)
                .attr(ATTRIBUTE_ACTION, "add")
                .attr(ATTRIBUTE_DENOM, &mapping.denom)
                .attr(ATTRIBUTE_SYMBOL, &mapping.oracle_symbol),
        );
        info!(target: LOG_TARGET, denom = %mapping.denom, symbol = %mapping.oracle_symbol, "Denom symbol mapping set");
        Ok(())
    }

    pub fn remove_denom_mapping(&self, ctx: &mut Context, sender: &str, denom: &str) -> CoreResult<()> {
        self.ensure_authority(ctx, sender)?;
        let key = denom_mapping_key(denom);
        if !ctx.store().has(&key) {
            return Err(CoreError::InvalidMapping(format!("no mapping for denom {denom}")));
        }
        ctx.store_mut().delete(&key);
        ctx.flags.price_dirty = true;
        ctx.emit(
            Event::new(EVENT_TYPE_DENOM_MAPPING)
                .attr(ATTRIBUTE_ACTION, "remove")
                .attr(ATTRIBUTE_DENOM, denom),
        );
        info!(target: LOG_TARGET, denom, "Denom symbol mapping removed");
        Ok(())
    }

    // Price cache

    pub fn get_denom_price(&self, ctx: &Context, denom: &str) -> CoreResult<Decimal> {
        ctx.mem_store()
            .get(&denom_price_key(denom))?
            .ok_or_else(|| CoreError::PriceNotFound(denom.to_string()))
    }

    /// Price of `base` in units of `quote`
    pub fn get_relative_denom_price(&self, ctx: &Context, base: &str, quote: &str) -> CoreResult<Decimal> {
        self.denom_prices(ctx)?.relative(base, quote)
    }

    pub fn denom_prices_updated_at(&self, ctx: &Context) -> CoreResult<Option<DateTime<Utc>>> {
        ctx.mem_store().get(DENOM_PRICES_UPDATED_AT_KEY)
    }

    /// Snapshot of the whole price cache
    pub fn denom_prices(&self, ctx: &Context) -> CoreResult<DenomPrices> {
        let mut prices = DenomPrices::new(self.denom_prices_updated_at(ctx)?);
        for (key, value) in ctx.mem_store().prefix_iter(DENOM_PRICE_PREFIX) {
            let denom = String::from_utf8_lossy(&key[DENOM_PRICE_PREFIX.len()..]).into_owned();
            prices.insert(denom, serde_json::from_slice(value)?);
        }
        Ok(prices)
    }

    /// Rebuild the price cache from the price source. When the source has no usable
    /// prices the previous cache is kept.
    pub fn update_denom_prices(&self, ctx: &mut Context) -> CoreResult<()> {
        let oracle = self.registry.price_oracle();
        let list = match oracle.get_symbol_price_list(ctx) {
            Ok(list) => list,
            Err(e) => {
                warn!(target: LOG_TARGET, source = oracle.source(), error = %e, "No usable symbol prices, keeping price cache");
                return Ok(());
            }
        };
        let mappings = self.denom_mappings(ctx)?;

        let mut entries = Vec::with_capacity(mappings.len());
        for mapping in &mappings {
            let symbol_price = match list.get(&mapping.oracle_symbol) {
                Some(price) if !price.is_zero() => price,
                _ => {
                    debug!(target: LOG_TARGET, denom = %mapping.denom, symbol = %mapping.oracle_symbol, "No price for symbol, skipping denom");
                    continue;
                }
            };
            let Some(price) = symbol_price.checked_mul(mapping.multiplier) else {
                warn!(
                    target: LOG_TARGET,
                    denom = %mapping.denom,
                    symbol = %mapping.oracle_symbol,
                    multiplier = %mapping.multiplier,
                    "Denom price overflows, skipping denom"
                );
                continue;
            };
            entries.push((denom_price_key(&mapping.denom), serde_json::to_vec(&price)?));
        }
        let updated_at = serde_json::to_vec(&list.updated_at)?;

        let written = entries.len();
        let mem = ctx.mem_store_mut();
        mem.delete_prefix(DENOM_PRICE_PREFIX);
        for (key, value) in entries {
            mem.set_raw(key, value);
        }
        mem.set_raw(DENOM_PRICES_UPDATED_AT_KEY.to_vec(), updated_at);

        info!(target: LOG_TARGET, source = oracle.source(), denoms = written, "Rebuilt denom price cache");
        Ok(())
    }

    // Pool cache

    /// Rebuild the pool cache from every pool source against the current price cache.
    /// A failing source contributes no pools.
    pub fn update_pools(&self, ctx: &mut Context) -> CoreResult<()> {
        let prices = self.denom_prices(ctx)?;
        ctx.mem_store_mut().delete_prefix(POOL_PREFIX);

        for oracle in self.registry.pool_oracles() {
            let source = oracle.source().to_string();
            let pools = match oracle.get_pools(ctx, &prices) {
                Ok(pools) => pools,
                Err(e) => {
                    warn!(target: LOG_TARGET, source = %source, error = %e, "Failed to fetch pools from pool source");
                    continue;
                }
            };
            let count = pools.len();
            for pool in pools {
                let key = pool_cache_key(&source, &pool.id);
                ctx.mem_store_mut().set(
                    key,
                    &CachedPool {
                        source: source.clone(),
                        pool,
                    },
                )?;
            }
            debug!(target: LOG_TARGET, source = %source, pools = count, "Cached pools");
        }
        Ok(())
    }

    pub fn cached_pools(&self, ctx: &Context) -> CoreResult<Vec<CachedPool>> {
        ctx.mem_store().prefix_values(POOL_PREFIX)
    }

    fn filtered_pools(&self, ctx: &Context, filter: &PoolFilter) -> CoreResult<Vec<CachedPool>> {
        let entries = match &filter.source {
            Some(source) => ctx.mem_store().prefix_values(&pool_source_prefix(source))?,
            None => self.cached_pools(ctx)?,
        };
        Ok(entries.into_iter().filter(|e| filter.matches(e)).collect())
    }

    pub fn get_pools_ranked_by_apy(&self, ctx: &Context, filter: &PoolFilter) -> CoreResult<Vec<CachedPool>> {
        let mut pools = self.filtered_pools(ctx, filter)?;
        rank_by_apy(&mut pools);
        Ok(pools)
    }

    pub fn get_pools_ranked_by_tvl(&self, ctx: &Context, filter: &PoolFilter) -> CoreResult<Vec<CachedPool>> {
        let mut pools = self.filtered_pools(ctx, filter)?;
        rank_by_tvl(&mut pools);
        Ok(pools)
    }

    // Cycle hooks

    /// Consume the update flags: new prices rebuild prices then pools, new pool data
    /// rebuilds pools only.
    pub fn update_mem_store(&self, ctx: &mut Context) -> CoreResult<()> {
        let flags = ctx.flags;
        ctx.flags.clear();
        if flags.price_dirty {
            self.update_denom_prices(ctx)?;
            self.update_pools(ctx)?;
        } else if flags.pool_dirty {
            self.update_pools(ctx)?;
        }
        Ok(())
    }

    pub fn is_mem_initialized(&self, ctx: &Context) -> bool {
        ctx.mem_store().has(MEM_INITIALIZED_KEY)
    }

    /// Populate the caches once after a restart. Safe to call every cycle.
    pub fn init_mem_store(&self, ctx: &mut Context) -> CoreResult<()> {
        let kind = ctx.mem_store().kind();
        if kind != StoreKind::Memory {
            return Err(CoreError::InvariantViolated(format!(
                "invalid memory store kind: got {kind}, expected {}",
                StoreKind::Memory
            )));
        }
        if self.is_mem_initialized(ctx) {
            return Ok(());
        }

        self.update_denom_prices(ctx)?;
        self.update_pools(ctx)?;
        ctx.mem_store_mut().set(MEM_INITIALIZED_KEY, &true)?;
        info!(target: LOG_TARGET, height = ctx.block_height(), "Initialized memory store");
        Ok(())
    }
}
