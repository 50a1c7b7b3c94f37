//! Osmosis submodule types: params, store keys, remote parameter cache records

use serde::{Deserialize, Serialize};
use std::time::Duration;

use qoracle_core::codec::int_string;
use qoracle_core::{Coin, CoreError, CoreResult, IbcParams, Int, RequestState, RequestTracker};
use rust_decimal::Decimal;

pub const SUBMODULE_NAME: &str = "osmosis";
pub const PORT_ID: &str = "qoracleosmosis";
pub const VERSION: &str = "icq-1";

pub const PARAMS_KEY: &[u8] = b"osmosis/params";
pub const CHAIN_PARAMS_STATE_KEY: &[u8] = b"osmosis/request_state/chain_params";
pub const INCENTIVIZED_POOLS_STATE_KEY: &[u8] = b"osmosis/request_state/incentivized_pools";
pub const POOLS_STATE_KEY: &[u8] = b"osmosis/request_state/pools";

pub const EPOCHS_INFO_PREFIX: &[u8] = b"osmosis/epochs/";
pub const POOLS_PREFIX: &[u8] = b"osmosis/pools/";
pub const LOCKABLE_DURATIONS_KEY: &[u8] = b"osmosis/lockable_durations";
pub const MINT_PARAMS_KEY: &[u8] = b"osmosis/mint_params";
pub const MINT_EPOCH_PROVISIONS_KEY: &[u8] = b"osmosis/mint_epoch_provisions";
pub const INCENTIVIZED_POOLS_KEY: &[u8] = b"osmosis/incentivized_pools";
pub const DISTR_INFO_KEY: &[u8] = b"osmosis/distr_info";
pub const POOLS_UPDATED_AT_KEY: &[u8] = b"osmosis/pools_updated_at";

pub const CHAIN_PARAMS: RequestTracker = RequestTracker::new(CHAIN_PARAMS_STATE_KEY, "osmosis_chain_params");
pub const INCENTIVIZED_POOLS: RequestTracker =
    RequestTracker::new(INCENTIVIZED_POOLS_STATE_KEY, "osmosis_incentivized_pools");
pub const POOLS: RequestTracker = RequestTracker::new(POOLS_STATE_KEY, "osmosis_pools");

pub const EVENT_TYPE_OSMOSIS_ACKNOWLEDGEMENT: &str = "osmosis_packet_acknowledgement";
pub const ATTRIBUTE_RESPONSES: &str = "responses";

pub fn epoch_key(identifier: &str) -> Vec<u8> {
    qoracle_core::store::key(&[EPOCHS_INFO_PREFIX, identifier.as_bytes()])
}

pub fn pool_key(id: u64) -> Vec<u8> {
    qoracle_core::store::key(&[POOLS_PREFIX, id.to_be_bytes().as_slice()])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub enabled: bool,
    /// Epoch whose end triggers the chain params and incentivized pools requests
    pub epoch_identifier: String,
    pub ibc: IbcParams,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            enabled: true,
            epoch_identifier: "minute".to_string(),
            ibc: IbcParams::default(),
        }
    }
}

impl Params {
    pub fn validate(&self) -> CoreResult<()> {
        if self.epoch_identifier.trim().is_empty() {
            return Err(CoreError::InvalidParams("epoch identifier cannot be empty".to_string()));
        }
        self.ibc.validate()
    }
}

/// Query paths of one batch, in request order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcqCallData {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcqResult {
    pub responses: usize,
    /// Remote height the batch was answered at
    pub height: i64,
}

pub type IcqRequestState = RequestState<IcqCallData, IcqResult>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    pub identifier: String,
    pub duration: Duration,
    pub current_epoch: i64,
    pub current_epoch_start_height: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolAsset {
    pub token: Coin,
    #[serde(with = "int_string")]
    pub weight: Int,
}

/// Balancer pool as reported by osmosis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancerPool {
    pub id: u64,
    pub address: String,
    pub total_shares: Option<Coin>,
    pub assets: Vec<PoolAsset>,
    #[serde(with = "int_string")]
    pub total_weight: Int,
}

impl BalancerPool {
    pub fn coins(&self) -> Vec<Coin> {
        self.assets.iter().map(|a| a.token.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintParams {
    pub mint_denom: String,
    pub epoch_identifier: String,
    /// Share of minted tokens going to pool incentives
    pub pool_incentives_proportion: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentivizedPool {
    pub pool_id: u64,
    pub lockable_duration: Duration,
    pub gauge_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrRecord {
    pub gauge_id: u64,
    #[serde(with = "int_string")]
    pub weight: Int,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrInfo {
    #[serde(with = "int_string")]
    pub total_weight: Int,
    pub records: Vec<DistrRecord>,
}

impl DistrInfo {
    pub fn gauge_weight(&self, gauge_id: u64) -> Option<Int> {
        self.records
            .iter()
            .find(|r| r.gauge_id == gauge_id)
            .map(|r| r.weight)
    }
}

/// Pool ids of the incentivized pools, deduplicated, in first-seen order
pub fn unique_pool_ids(incentivized: &[IncentivizedPool]) -> Vec<u64> {
    let mut ids: Vec<u64> = Vec::with_capacity(incentivized.len());
    for pool in incentivized {
        if !ids.contains(&pool.pool_id) {
            ids.push(pool.pool_id);
        }
    }
    ids
}

/// Everything the APY calculation needs from the remote parameter cache
#[derive(Debug, Clone, PartialEq)]
pub struct ChainParamsSnapshot {
    pub epochs: Vec<EpochInfo>,
    pub mint_params: Option<MintParams>,
    pub epoch_provisions: Option<Decimal>,
    pub incentivized_pools: Vec<IncentivizedPool>,
    pub distr_info: Option<DistrInfo>,
}
