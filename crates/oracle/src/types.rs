//! Qoracle module params and store keys

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use qoracle_core::store::key;
use qoracle_core::{CoreError, CoreResult, DenomSymbolMapping};

pub const MODULE_NAME: &str = "qoracle";

// Persistent store
pub const PARAMS_KEY: &[u8] = b"qoracle/params";
pub const DENOM_MAPPING_PREFIX: &[u8] = b"qoracle/denom_mapping/";

// Memory store
pub const MEM_INITIALIZED_KEY: &[u8] = b"mem_initialized";
pub const DENOM_PRICE_PREFIX: &[u8] = b"denom_price/";
pub const DENOM_PRICES_UPDATED_AT_KEY: &[u8] = b"denom_prices_updated_at";
pub const POOL_PREFIX: &[u8] = b"pool/";

pub const EVENT_TYPE_DENOM_MAPPING: &str = "denom_symbol_mapping";
pub const ATTRIBUTE_DENOM: &str = "denom";
pub const ATTRIBUTE_SYMBOL: &str = "oracle_symbol";
pub const ATTRIBUTE_ACTION: &str = "action";

pub fn denom_mapping_key(denom: &str) -> Vec<u8> {
    key(&[DENOM_MAPPING_PREFIX, denom.as_bytes()])
}

pub fn denom_price_key(denom: &str) -> Vec<u8> {
    key(&[DENOM_PRICE_PREFIX, denom.as_bytes()])
}

pub fn pool_source_prefix(source: &str) -> Vec<u8> {
    key(&[POOL_PREFIX, source.as_bytes(), "/".as_bytes()])
}

pub fn pool_cache_key(source: &str, pool_id: &str) -> Vec<u8> {
    key(&[POOL_PREFIX, source.as_bytes(), "/".as_bytes(), pool_id.as_bytes()])
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Address allowed to add and remove denom symbol mappings, usually governance
    pub authority: String,
}

impl Params {
    pub fn validate(&self) -> CoreResult<()> {
        if self.authority.trim().is_empty() {
            return Err(CoreError::InvalidParams("authority cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// `uatom` and `uosmo` priced from their whole-token symbols
pub fn default_denom_mappings() -> Vec<DenomSymbolMapping> {
    vec![
        DenomSymbolMapping::new("uatom", "ATOM", Decimal::new(1, 6)),
        DenomSymbolMapping::new("uosmo", "OSMO", Decimal::new(1, 6)),
    ]
}
