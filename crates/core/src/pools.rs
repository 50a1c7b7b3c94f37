//! Liquidity pool definitions shared by pool sources and the pool cache

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::Coin;

/// A pool with its derived metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub assets: Vec<Coin>,
    /// Total value locked, in the price unit of the denom price cache
    pub tvl: Decimal,
    /// Annual percentage yield, in percent
    pub apy: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Pool {
    pub fn has_denom(&self, denom: &str) -> bool {
        self.assets.iter().any(|c| c.denom == denom)
    }
}

/// Pool cache entry: a pool tagged with the source that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPool {
    pub source: String,
    pub pool: Pool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolFilter {
    pub source: Option<String>,
    pub denom: Option<String>,
}

impl PoolFilter {
    pub fn by_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            denom: None,
        }
    }

    pub fn by_denom(denom: impl Into<String>) -> Self {
        Self {
            source: None,
            denom: Some(denom.into()),
        }
    }

    pub fn matches(&self, entry: &CachedPool) -> bool {
        if let Some(source) = &self.source {
            if &entry.source != source {
                return false;
            }
        }
        match &self.denom {
            Some(denom) => entry.pool.has_denom(denom),
            None => true,
        }
    }
}

/// Highest APY first; equal APYs keep their relative order
pub fn rank_by_apy(pools: &mut [CachedPool]) {
    pools.sort_by(|a, b| descending(a.pool.apy, b.pool.apy));
}

/// Highest TVL first; equal TVLs keep their relative order
pub fn rank_by_tvl(pools: &mut [CachedPool]) {
    pools.sort_by(|a, b| descending(a.pool.tvl, b.pool.tvl));
}

fn descending(a: Decimal, b: Decimal) -> Ordering {
    b.cmp(&a)
}
