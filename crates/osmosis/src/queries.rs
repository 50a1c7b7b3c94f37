//! Interchain query batches: building requests and decoding responses by path

use prost::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::warn;

use qoracle_core::codec::base64_bytes;
use qoracle_core::types::{parse_int, parse_sdk_dec};
use qoracle_core::{Coin, CoreError, CoreResult, RequestTracker};
use rust_decimal::Decimal;

use crate::proto;
use crate::types::{
    BalancerPool, DistrInfo, DistrRecord, EpochInfo, IncentivizedPool, MintParams, PoolAsset, CHAIN_PARAMS,
    INCENTIVIZED_POOLS, POOLS,
};

pub const EPOCHS_INFO_PATH: &str = "/osmosis.epochs.v1beta1.Query/EpochInfos";
pub const POOL_PATH: &str = "/osmosis.gamm.v1beta1.Query/Pool";
pub const LOCKABLE_DURATIONS_PATH: &str = "/osmosis.poolincentives.v1beta1.Query/LockableDurations";
pub const MINT_PARAMS_PATH: &str = "/osmosis.mint.v1beta1.Query/Params";
pub const MINT_EPOCH_PROVISIONS_PATH: &str = "/osmosis.mint.v1beta1.Query/EpochProvisions";
pub const INCENTIVIZED_POOLS_PATH: &str = "/osmosis.poolincentives.v1beta1.Query/IncentivizedPools";
pub const DISTR_INFO_PATH: &str = "/osmosis.poolincentives.v1beta1.Query/DistrInfo";

/// ICQ packet: a serialized `CosmosQuery` plus the memo naming the batch kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchainQueryPacketData {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub memo: String,
}

impl InterchainQueryPacketData {
    pub fn from_bytes(bz: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(bz).map_err(|e| CoreError::InvalidPacket(format!("icq packet: {e}")))
    }

    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn requests(&self) -> CoreResult<Vec<proto::RequestQuery>> {
        proto::CosmosQuery::decode(self.data.as_slice())
            .map(|q| q.requests)
            .map_err(|e| CoreError::InvalidPacket(format!("cosmos query: {e}")))
    }
}

/// ICQ acknowledgement payload: a serialized `CosmosResponse`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterchainQueryPacketAck {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl InterchainQueryPacketAck {
    pub fn from_bytes(bz: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(bz).map_err(|e| CoreError::InvalidAcknowledgement(format!("icq acknowledgement: {e}")))
    }

    pub fn responses(&self) -> CoreResult<Vec<proto::ResponseQuery>> {
        proto::CosmosResponse::decode(self.data.as_slice())
            .map(|r| r.responses)
            .map_err(|e| CoreError::InvalidAcknowledgement(format!("cosmos response: {e}")))
    }
}

/// The three batches sent to osmosis. The memo of each packet names its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    ChainParams,
    IncentivizedPools,
    Pools,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [RequestKind::ChainParams, RequestKind::IncentivizedPools, RequestKind::Pools];

    pub fn memo(&self) -> &'static str {
        match self {
            RequestKind::ChainParams => "chain_params",
            RequestKind::IncentivizedPools => "incentivized_pools",
            RequestKind::Pools => "pools",
        }
    }

    pub fn from_memo(memo: &str) -> CoreResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.memo() == memo)
            .ok_or_else(|| CoreError::UnknownSource(format!("icq memo {memo:?}")))
    }

    pub fn tracker(&self) -> RequestTracker {
        match self {
            RequestKind::ChainParams => CHAIN_PARAMS,
            RequestKind::IncentivizedPools => INCENTIVIZED_POOLS,
            RequestKind::Pools => POOLS,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.memo())
    }
}

fn request<M: Message>(path: &str, msg: &M) -> proto::RequestQuery {
    proto::RequestQuery {
        data: msg.encode_to_vec(),
        path: path.to_string(),
        height: 0,
        prove: false,
    }
}

pub fn chain_params_batch() -> Vec<proto::RequestQuery> {
    vec![
        request(EPOCHS_INFO_PATH, &proto::QueryEpochsInfoRequest {}),
        request(LOCKABLE_DURATIONS_PATH, &proto::QueryLockableDurationsRequest {}),
        request(MINT_PARAMS_PATH, &proto::QueryMintParamsRequest {}),
        request(MINT_EPOCH_PROVISIONS_PATH, &proto::QueryEpochProvisionsRequest {}),
        request(DISTR_INFO_PATH, &proto::QueryDistrInfoRequest {}),
    ]
}

pub fn incentivized_pools_batch() -> Vec<proto::RequestQuery> {
    vec![request(INCENTIVIZED_POOLS_PATH, &proto::QueryIncentivizedPoolsRequest {})]
}

pub fn pools_batch(pool_ids: &[u64]) -> Vec<proto::RequestQuery> {
    pool_ids
        .iter()
        .map(|id| request(POOL_PATH, &proto::QueryPoolRequest { pool_id: *id }))
        .collect()
}

/// Serialize a batch into ICQ packet data
pub fn packet_data(kind: RequestKind, requests: Vec<proto::RequestQuery>) -> InterchainQueryPacketData {
    InterchainQueryPacketData {
        data: proto::CosmosQuery { requests }.encode_to_vec(),
        memo: kind.memo().to_string(),
    }
}

/// One decoded sub-response, not yet written
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteUpdate {
    EpochsInfo(Vec<EpochInfo>),
    Pool(BalancerPool),
    LockableDurations(Vec<Duration>),
    MintParams(MintParams),
    MintEpochProvisions(Decimal),
    IncentivizedPools(Vec<IncentivizedPool>),
    DistrInfo(DistrInfo),
}

/// Decode every sub-response of a batch by the path of its request.
///
/// Fails on the first non-zero response code or malformed value; unknown paths are skipped.
pub fn decode_batch(
    requests: &[proto::RequestQuery],
    responses: &[proto::ResponseQuery],
) -> CoreResult<Vec<RemoteUpdate>> {
    if requests.len() != responses.len() {
        return Err(CoreError::InvalidAcknowledgement(format!(
            "{} responses for {} requests",
            responses.len(),
            requests.len()
        )));
    }

    let mut updates = Vec::with_capacity(responses.len());
    for (req, resp) in requests.iter().zip(responses) {
        if resp.code != 0 {
            return Err(CoreError::FailedQueryResponse {
                path: req.path.clone(),
                code: resp.code,
            });
        }
        match decode_response(&req.path, &resp.value)? {
            Some(update) => updates.push(update),
            None => warn!(path = %req.path, "No icq response handler for path, skipping"),
        }
    }
    Ok(updates)
}

fn decode_err(path: &str, e: impl fmt::Display) -> CoreError {
    CoreError::ResultDecode(format!("{path}: {e}"))
}

fn decode_response(path: &str, value: &[u8]) -> CoreResult<Option<RemoteUpdate>> {
    let update = match path {
        EPOCHS_INFO_PATH => {
            let resp = proto::QueryEpochsInfoResponse::decode(value).map_err(|e| decode_err(path, e))?;
            let epochs = resp
                .epochs
                .into_iter()
                .map(|e| EpochInfo {
                    duration: to_duration(e.duration.as_ref()),
                    identifier: e.identifier,
                    current_epoch: e.current_epoch,
                    current_epoch_start_height: e.current_epoch_start_height,
                })
                .collect();
            RemoteUpdate::EpochsInfo(epochs)
        }
        POOL_PATH => {
            let resp = proto::QueryPoolResponse::decode(value).map_err(|e| decode_err(path, e))?;
            let any = resp.pool.ok_or_else(|| decode_err(path, "missing pool"))?;
            let pool = proto::BalancerPool::decode(any.value.as_slice()).map_err(|e| decode_err(path, e))?;
            RemoteUpdate::Pool(balancer_pool(pool)?)
        }
        LOCKABLE_DURATIONS_PATH => {
            let resp = proto::QueryLockableDurationsResponse::decode(value).map_err(|e| decode_err(path, e))?;
            RemoteUpdate::LockableDurations(resp.lockable_durations.iter().map(|d| to_duration(Some(d))).collect())
        }
        MINT_PARAMS_PATH => {
            let resp = proto::QueryMintParamsResponse::decode(value).map_err(|e| decode_err(path, e))?;
            let params = resp.params.ok_or_else(|| decode_err(path, "missing params"))?;
            let proportion = params
                .distribution_proportions
                .map(|p| parse_sdk_dec(&p.pool_incentives))
                .transpose()?
                .unwrap_or_default();
            RemoteUpdate::MintParams(MintParams {
                mint_denom: params.mint_denom,
                epoch_identifier: params.epoch_identifier,
                pool_incentives_proportion: proportion,
            })
        }
        MINT_EPOCH_PROVISIONS_PATH => {
            let resp = proto::QueryEpochProvisionsResponse::decode(value).map_err(|e| decode_err(path, e))?;
            let raw = std::str::from_utf8(&resp.epoch_provisions).map_err(|e| decode_err(path, e))?;
            RemoteUpdate::MintEpochProvisions(parse_sdk_dec(raw)?)
        }
        INCENTIVIZED_POOLS_PATH => {
            let resp = proto::QueryIncentivizedPoolsResponse::decode(value).map_err(|e| decode_err(path, e))?;
            let pools = resp
                .incentivized_pools
                .iter()
                .map(|p| IncentivizedPool {
                    pool_id: p.pool_id,
                    lockable_duration: to_duration(p.lockable_duration.as_ref()),
                    gauge_id: p.gauge_id,
                })
                .collect();
            RemoteUpdate::IncentivizedPools(pools)
        }
        DISTR_INFO_PATH => {
            let resp = proto::QueryDistrInfoResponse::decode(value).map_err(|e| decode_err(path, e))?;
            let info = resp.distr_info.unwrap_or_default();
            let records = info
                .records
                .iter()
                .map(|r| {
                    Ok(DistrRecord {
                        gauge_id: r.gauge_id,
                        weight: parse_int(&r.weight)?,
                    })
                })
                .collect::<CoreResult<Vec<_>>>()?;
            RemoteUpdate::DistrInfo(DistrInfo {
                total_weight: parse_int(&info.total_weight)?,
                records,
            })
        }
        _ => return Ok(None),
    };
    Ok(Some(update))
}

fn to_duration(d: Option<&proto::ProtoDuration>) -> Duration {
    match d {
        Some(d) => Duration::new(d.seconds.max(0) as u64, d.nanos.max(0) as u32),
        None => Duration::ZERO,
    }
}

fn to_coin(c: &proto::ProtoCoin) -> CoreResult<Coin> {
    Ok(Coin {
        denom: c.denom.clone(),
        amount: parse_int(&c.amount)?,
    })
}

fn balancer_pool(pool: proto::BalancerPool) -> CoreResult<BalancerPool> {
    let assets = pool
        .pool_assets
        .iter()
        .map(|a| {
            let token = a
                .token
                .as_ref()
                .ok_or_else(|| decode_err(POOL_PATH, format!("pool {} asset without token", pool.id)))?;
            Ok(PoolAsset {
                token: to_coin(token)?,
                weight: parse_int(&a.weight)?,
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(BalancerPool {
        id: pool.id,
        address: pool.address,
        total_shares: pool.total_shares.as_ref().map(to_coin).transpose()?,
        assets,
        total_weight: parse_int(&pool.total_weight)?,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Encoded osmosis responses for tests

    use super::*;

    pub fn ok(value: Vec<u8>) -> proto::ResponseQuery {
        proto::ResponseQuery {
            code: 0,
            log: String::new(),
            value,
            height: 100,
        }
    }

    pub fn duration(seconds: i64) -> Option<proto::ProtoDuration> {
        Some(proto::ProtoDuration { seconds, nanos: 0 })
    }

    pub fn coin(denom: &str, amount: &str) -> Option<proto::ProtoCoin> {
        Some(proto::ProtoCoin {
            denom: denom.to_string(),
            amount: amount.to_string(),
        })
    }

    pub fn epochs(list: &[(&str, i64)]) -> Vec<u8> {
        proto::QueryEpochsInfoResponse {
            epochs: list
                .iter()
                .map(|(id, secs)| proto::EpochInfo {
                    identifier: id.to_string(),
                    duration: duration(*secs),
                    current_epoch: 10,
                    current_epoch_start_height: 1000,
                })
                .collect(),
        }
        .encode_to_vec()
    }

    pub fn lockable_durations() -> Vec<u8> {
        proto::QueryLockableDurationsResponse {
            lockable_durations: vec![duration(86_400).unwrap_or_default(), duration(604_800).unwrap_or_default()],
        }
        .encode_to_vec()
    }

    /// `pool_incentives` is the raw 18-digit fixed-point form
    pub fn mint_params(mint_denom: &str, epoch: &str, pool_incentives: &str) -> Vec<u8> {
        proto::QueryMintParamsResponse {
            params: Some(proto::MintParams {
                mint_denom: mint_denom.to_string(),
                epoch_identifier: epoch.to_string(),
                distribution_proportions: Some(proto::DistributionProportions {
                    staking: "250000000000000000".to_string(),
                    pool_incentives: pool_incentives.to_string(),
                }),
            }),
        }
        .encode_to_vec()
    }

    pub fn epoch_provisions(raw: &str) -> Vec<u8> {
        proto::QueryEpochProvisionsResponse {
            epoch_provisions: raw.as_bytes().to_vec(),
        }
        .encode_to_vec()
    }

    pub fn distr_info(total: &str, records: &[(u64, &str)]) -> Vec<u8> {
        proto::QueryDistrInfoResponse {
            distr_info: Some(proto::DistrInfo {
                total_weight: total.to_string(),
                records: records
                    .iter()
                    .map(|(gauge_id, weight)| proto::DistrRecord {
                        gauge_id: *gauge_id,
                        weight: weight.to_string(),
                    })
                    .collect(),
            }),
        }
        .encode_to_vec()
    }

    pub fn incentivized_pools(list: &[(u64, u64)]) -> Vec<u8> {
        proto::QueryIncentivizedPoolsResponse {
            incentivized_pools: list
                .iter()
                .map(|(pool_id, gauge_id)| proto::IncentivizedPool {
                    pool_id: *pool_id,
                    lockable_duration: duration(86_400),
                    gauge_id: *gauge_id,
                })
                .collect(),
        }
        .encode_to_vec()
    }

    pub fn pool(id: u64, assets: &[(&str, &str)]) -> Vec<u8> {
        let pool = proto::BalancerPool {
            address: format!("osmo1pool{id}"),
            id,
            total_shares: coin(&format!("gamm/pool/{id}"), "100000000000000000000"),
            pool_assets: assets
                .iter()
                .map(|(denom, amount)| proto::PoolAsset {
                    token: coin(denom, amount),
                    weight: "536870912000000".to_string(),
                })
                .collect(),
            total_weight: "1073741824000000".to_string(),
        };
        proto::QueryPoolResponse {
            pool: Some(proto::ProtoAny {
                type_url: "/osmosis.gamm.v1beta1.Pool".to_string(),
                value: pool.encode_to_vec(),
            }),
        }
        .encode_to_vec()
    }

    /// Successful responses for every request of the chain params batch, in batch order
    pub fn chain_params_responses() -> Vec<proto::ResponseQuery> {
        vec![
            ok(epochs(&[("day", 86_400), ("week", 604_800)])),
            ok(lockable_durations()),
            ok(mint_params("uosmo", "day", "250000000000000000")),
            ok(epoch_provisions("821917808219178082191780")),
            ok(distr_info("100", &[(1, "10"), (2, "20"), (3, "30")])),
        ]
    }
}
