//! Price types shared by price sources and the price cache

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{CoreError, CoreResult};

/// Prices reported by a price source, keyed by oracle symbol (e.g. "BTC")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolPriceList {
    pub prices: BTreeMap<String, Decimal>,
    pub updated_at: DateTime<Utc>,
}

impl SymbolPriceList {
    pub fn new(updated_at: DateTime<Utc>) -> Self {
        Self {
            prices: BTreeMap::new(),
            updated_at,
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }
}

/// Maps a local denomination onto an oracle symbol: `denom price = symbol price * multiplier`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomSymbolMapping {
    pub denom: String,
    pub oracle_symbol: String,
    pub multiplier: Decimal,
}

impl DenomSymbolMapping {
    pub fn new(denom: impl Into<String>, oracle_symbol: impl Into<String>, multiplier: Decimal) -> Self {
        Self {
            denom: denom.into(),
            oracle_symbol: oracle_symbol.into(),
            multiplier,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.denom.trim().is_empty() {
            return Err(CoreError::InvalidMapping("empty denom".to_string()));
        }
        if self.oracle_symbol.trim().is_empty() {
            return Err(CoreError::InvalidMapping(format!("empty oracle symbol for {}", self.denom)));
        }
        if self.multiplier <= Decimal::ZERO {
            return Err(CoreError::InvalidMapping(format!(
                "multiplier of {} must be positive, got {}",
                self.denom, self.multiplier
            )));
        }
        Ok(())
    }
}

/// Snapshot of the denom price cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DenomPrices {
    prices: BTreeMap<String, Decimal>,
    updated_at: Option<DateTime<Utc>>,
}

impl DenomPrices {
    pub fn new(updated_at: Option<DateTime<Utc>>) -> Self {
        Self {
            prices: BTreeMap::new(),
            updated_at,
        }
    }

    pub fn insert(&mut self, denom: impl Into<String>, price: Decimal) {
        self.prices.insert(denom.into(), price);
    }

    pub fn get(&self, denom: &str) -> CoreResult<Decimal> {
        self.prices
            .get(denom)
            .copied()
            .ok_or_else(|| CoreError::PriceNotFound(denom.to_string()))
    }

    /// Price of `base` expressed in `quote`
    pub fn relative(&self, base: &str, quote: &str) -> CoreResult<Decimal> {
        let base_price = self.get(base)?;
        let quote_price = self.get(quote)?;
        if quote_price.is_zero() {
            return Err(CoreError::DivideByZero(format!("price of {quote} is zero")));
        }
        base_price
            .checked_div(quote_price)
            .ok_or_else(|| CoreError::Overflow(format!("{base}/{quote}")))
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.prices.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}
