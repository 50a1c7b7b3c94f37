//! Protobuf messages exchanged with the osmosis chain through interchain queries.
//!
//! Only the fields this module reads are declared; prost skips the others.

use prost::Message;

/// google.protobuf.Duration
#[derive(Clone, PartialEq, Message)]
pub struct ProtoDuration {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
    #[prost(int32, tag = "2")]
    pub nanos: i32,
}

/// google.protobuf.Any
#[derive(Clone, PartialEq, Message)]
pub struct ProtoAny {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// cosmos.base.v1beta1.Coin
#[derive(Clone, PartialEq, Message)]
pub struct ProtoCoin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

// tendermint.abci query envelopes

#[derive(Clone, PartialEq, Message)]
pub struct RequestQuery {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
    #[prost(string, tag = "2")]
    pub path: String,
    #[prost(int64, tag = "3")]
    pub height: i64,
    #[prost(bool, tag = "4")]
    pub prove: bool,
}

#[derive(Clone, PartialEq, Message)]
pub struct ResponseQuery {
    #[prost(uint32, tag = "1")]
    pub code: u32,
    #[prost(string, tag = "3")]
    pub log: String,
    #[prost(bytes = "vec", tag = "7")]
    pub value: Vec<u8>,
    #[prost(int64, tag = "9")]
    pub height: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct CosmosQuery {
    #[prost(message, repeated, tag = "1")]
    pub requests: Vec<RequestQuery>,
}

#[derive(Clone, PartialEq, Message)]
pub struct CosmosResponse {
    #[prost(message, repeated, tag = "1")]
    pub responses: Vec<ResponseQuery>,
}

// osmosis.epochs.v1beta1

#[derive(Clone, PartialEq, Message)]
pub struct EpochInfo {
    #[prost(string, tag = "1")]
    pub identifier: String,
    #[prost(message, optional, tag = "3")]
    pub duration: Option<ProtoDuration>,
    #[prost(int64, tag = "4")]
    pub current_epoch: i64,
    #[prost(int64, tag = "8")]
    pub current_epoch_start_height: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryEpochsInfoRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryEpochsInfoResponse {
    #[prost(message, repeated, tag = "1")]
    pub epochs: Vec<EpochInfo>,
}

// osmosis.gamm.v1beta1 and the balancer pool model

#[derive(Clone, PartialEq, Message)]
pub struct QueryPoolRequest {
    #[prost(uint64, tag = "1")]
    pub pool_id: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryPoolResponse {
    #[prost(message, optional, tag = "1")]
    pub pool: Option<ProtoAny>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PoolAsset {
    #[prost(message, optional, tag = "1")]
    pub token: Option<ProtoCoin>,
    #[prost(string, tag = "2")]
    pub weight: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct BalancerPool {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(uint64, tag = "2")]
    pub id: u64,
    #[prost(message, optional, tag = "5")]
    pub total_shares: Option<ProtoCoin>,
    #[prost(message, repeated, tag = "6")]
    pub pool_assets: Vec<PoolAsset>,
    #[prost(string, tag = "7")]
    pub total_weight: String,
}

// osmosis.poolincentives.v1beta1

#[derive(Clone, PartialEq, Message)]
pub struct QueryLockableDurationsRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryLockableDurationsResponse {
    #[prost(message, repeated, tag = "1")]
    pub lockable_durations: Vec<ProtoDuration>,
}

#[derive(Clone, PartialEq, Message)]
pub struct IncentivizedPool {
    #[prost(uint64, tag = "1")]
    pub pool_id: u64,
    #[prost(message, optional, tag = "2")]
    pub lockable_duration: Option<ProtoDuration>,
    #[prost(uint64, tag = "3")]
    pub gauge_id: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryIncentivizedPoolsRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryIncentivizedPoolsResponse {
    #[prost(message, repeated, tag = "1")]
    pub incentivized_pools: Vec<IncentivizedPool>,
}

#[derive(Clone, PartialEq, Message)]
pub struct DistrRecord {
    #[prost(uint64, tag = "1")]
    pub gauge_id: u64,
    #[prost(string, tag = "2")]
    pub weight: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct DistrInfo {
    #[prost(string, tag = "1")]
    pub total_weight: String,
    #[prost(message, repeated, tag = "2")]
    pub records: Vec<DistrRecord>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryDistrInfoRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryDistrInfoResponse {
    #[prost(message, optional, tag = "1")]
    pub distr_info: Option<DistrInfo>,
}

// osmosis.mint.v1beta1

#[derive(Clone, PartialEq, Message)]
pub struct DistributionProportions {
    #[prost(string, tag = "1")]
    pub staking: String,
    #[prost(string, tag = "2")]
    pub pool_incentives: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct MintParams {
    #[prost(string, tag = "1")]
    pub mint_denom: String,
    #[prost(string, tag = "3")]
    pub epoch_identifier: String,
    #[prost(message, optional, tag = "6")]
    pub distribution_proportions: Option<DistributionProportions>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryMintParamsRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryMintParamsResponse {
    #[prost(message, optional, tag = "1")]
    pub params: Option<MintParams>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QueryEpochProvisionsRequest {}

#[derive(Clone, PartialEq, Message)]
pub struct QueryEpochProvisionsResponse {
    /// Raw integer form of a fixed-point decimal, as text
    #[prost(bytes = "vec", tag = "1")]
    pub epoch_provisions: Vec<u8>,
}
