//! Shared harness: a chain driving the qoracle module block by block

#![allow(dead_code)]

use prost::Message;
use tracing_subscriber::EnvFilter;

use qoracle::{init_genesis, GenesisConfig, QOracleModule};
use qoracle_bandchain::obi::ObiEncode;
use qoracle_bandchain::types::{
    CoinRatesResult, OracleRequestPacketAcknowledgement, OracleResponsePacketData, ResolveStatus,
    COIN_RATES_CLIENT_ID,
};
use qoracle_bandchain::BandchainKeeper;
use qoracle_core::testutil::{header_at, MockTransport};
use qoracle_core::{Acknowledgement, Context, Height, MultiStore, Packet};
use qoracle_osmosis::proto;
use qoracle_osmosis::queries::InterchainQueryPacketAck;
use qoracle_osmosis::OsmosisKeeper;

pub const GOV: &str = "quasar1gov";
pub const BAND_CHANNEL: &str = "channel-0";
pub const OSMOSIS_CHANNEL: &str = "channel-1";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}

pub struct TestChain {
    pub module: QOracleModule,
    pub stores: MultiStore,
    pub transport: MockTransport,
    pub height: i64,
}

impl TestChain {
    pub fn new() -> Self {
        init_tracing();

        let module = QOracleModule::new(BandchainKeeper::default(), OsmosisKeeper::default()).unwrap();
        let mut transport = MockTransport::with_channel(qoracle_bandchain::PORT_ID, BAND_CHANNEL);
        transport.open_channel(qoracle_osmosis::PORT_ID, OSMOSIS_CHANNEL);

        let mut genesis = GenesisConfig::default();
        genesis.params.authority = GOV.to_string();
        genesis.bandchain.ibc.authorized_channel = BAND_CHANNEL.to_string();
        genesis.bandchain.coin_rates.symbols = vec!["ATOM".to_string(), "OSMO".to_string()];
        genesis.osmosis.ibc.authorized_channel = OSMOSIS_CHANNEL.to_string();

        let mut stores = MultiStore::new();
        let mut ctx = Context::new(header_at(0), &mut stores, &mut transport);
        init_genesis(&mut ctx, &module, &genesis).unwrap();
        drop(ctx);

        Self {
            module,
            stores,
            transport,
            height: 0,
        }
    }

    /// Run one block: begin block, `f`, end block
    pub fn block<T>(&mut self, f: impl FnOnce(&QOracleModule, &mut Context) -> T) -> T {
        self.height += 1;
        let mut ctx = Context::new(header_at(self.height), &mut self.stores, &mut self.transport);
        self.module.begin_block(&mut ctx).unwrap();
        let out = f(&self.module, &mut ctx);
        self.module.end_block(&mut ctx).unwrap();
        out
    }

    /// Read state at the current height
    pub fn query<T>(&mut self, f: impl FnOnce(&QOracleModule, &Context) -> T) -> T {
        let ctx = Context::new(header_at(self.height), &mut self.stores, &mut self.transport);
        f(&self.module, &ctx)
    }

    /// The `index`-th packet sent, as the transport commits it
    pub fn sent_packet(&self, index: usize) -> Packet {
        let sent = &self.transport.sent[index];
        Packet {
            sequence: index as u64 + 1,
            source_port: sent.source_port.clone(),
            source_channel: sent.source_channel.clone(),
            destination_port: "remote".to_string(),
            destination_channel: "channel-9".to_string(),
            data: sent.data.clone(),
            timeout_height: Height::default(),
            timeout_timestamp: sent.timeout.timestamp,
        }
    }
}

// Bandchain

pub fn band_request_ack(request_id: u64) -> Vec<u8> {
    let payload = serde_json::to_vec(&OracleRequestPacketAcknowledgement { request_id }).unwrap();
    Acknowledgement::success(payload).encode().unwrap()
}

pub fn band_response(sequence: u64, request_id: u64, rates: &[u64]) -> Packet {
    let data = OracleResponsePacketData {
        client_id: COIN_RATES_CLIENT_ID.to_string(),
        request_id,
        ans_count: 4,
        request_time: 1_654_041_600,
        resolve_time: 1_654_041_610,
        resolve_status: ResolveStatus::Success,
        result: CoinRatesResult { rates: rates.to_vec() }.obi_encode().unwrap(),
    };
    Packet {
        sequence,
        source_port: "oracle".to_string(),
        source_channel: "channel-9".to_string(),
        destination_port: qoracle_bandchain::PORT_ID.to_string(),
        destination_channel: BAND_CHANNEL.to_string(),
        data: data.to_bytes().unwrap(),
        timeout_height: Height::default(),
        timeout_timestamp: 0,
    }
}

// Osmosis

pub fn icq_ack(values: Vec<Vec<u8>>) -> Vec<u8> {
    let responses = values
        .into_iter()
        .map(|value| proto::ResponseQuery {
            code: 0,
            log: String::new(),
            value,
            height: 500,
        })
        .collect();
    let ack = InterchainQueryPacketAck {
        data: proto::CosmosResponse { responses }.encode_to_vec(),
    };
    Acknowledgement::success(serde_json::to_vec(&ack).unwrap()).encode().unwrap()
}

fn duration(seconds: i64) -> proto::ProtoDuration {
    proto::ProtoDuration { seconds, nanos: 0 }
}

fn coin(denom: &str, amount: &str) -> proto::ProtoCoin {
    proto::ProtoCoin {
        denom: denom.to_string(),
        amount: amount.to_string(),
    }
}

/// Daily mint epoch of 1000 uosmo, a quarter going to pool incentives; gauges 1 and 2
/// hold 30 of 100 distribution weight
pub fn chain_params_values() -> Vec<Vec<u8>> {
    vec![
        proto::QueryEpochsInfoResponse {
            epochs: vec![proto::EpochInfo {
                identifier: "day".to_string(),
                duration: Some(duration(86_400)),
                current_epoch: 3,
                current_epoch_start_height: 400,
            }],
        }
        .encode_to_vec(),
        proto::QueryLockableDurationsResponse {
            lockable_durations: vec![duration(86_400)],
        }
        .encode_to_vec(),
        proto::QueryMintParamsResponse {
            params: Some(proto::MintParams {
                mint_denom: "uosmo".to_string(),
                epoch_identifier: "day".to_string(),
                distribution_proportions: Some(proto::DistributionProportions {
                    staking: "500000000000000000".to_string(),
                    pool_incentives: "250000000000000000".to_string(),
                }),
            }),
        }
        .encode_to_vec(),
        proto::QueryEpochProvisionsResponse {
            epoch_provisions: b"1000000000000000000000".to_vec(),
        }
        .encode_to_vec(),
        proto::QueryDistrInfoResponse {
            distr_info: Some(proto::DistrInfo {
                total_weight: "100".to_string(),
                records: vec![
                    proto::DistrRecord {
                        gauge_id: 1,
                        weight: "10".to_string(),
                    },
                    proto::DistrRecord {
                        gauge_id: 2,
                        weight: "20".to_string(),
                    },
                    proto::DistrRecord {
                        gauge_id: 3,
                        weight: "70".to_string(),
                    },
                ],
            }),
        }
        .encode_to_vec(),
    ]
}

pub fn incentivized_pools_value(pools: &[(u64, u64)]) -> Vec<u8> {
    proto::QueryIncentivizedPoolsResponse {
        incentivized_pools: pools
            .iter()
            .map(|(pool_id, gauge_id)| proto::IncentivizedPool {
                pool_id: *pool_id,
                lockable_duration: Some(duration(86_400)),
                gauge_id: *gauge_id,
            })
            .collect(),
    }
    .encode_to_vec()
}

pub fn pool_value(id: u64, assets: &[(&str, &str)]) -> Vec<u8> {
    let pool = proto::BalancerPool {
        address: format!("osmo1pool{id}"),
        id,
        total_shares: Some(coin(&format!("gamm/pool/{id}"), "100000000000000000000")),
        pool_assets: assets
            .iter()
            .map(|(denom, amount)| proto::PoolAsset {
                token: Some(coin(denom, amount)),
                weight: "1".to_string(),
            })
            .collect(),
        total_weight: assets.len().to_string(),
    };
    proto::QueryPoolResponse {
        pool: Some(proto::ProtoAny {
            type_url: "/osmosis.gamm.v1beta1.Pool".to_string(),
            value: pool.encode_to_vec(),
        }),
    }
    .encode_to_vec()
}

/// Epoch end, then acknowledgements for every request it caused, up to the pools
/// request (packet index 3) which is left in flight.
///
/// Packet order: 0 coin rates, 1 chain params, 2 incentivized pools, 3 pools.
pub fn request_everything(chain: &mut TestChain, band_request_id: u64) {
    chain.block(|module, ctx| module.after_epoch_end(ctx, "minute"));
    assert_eq!(chain.transport.sent.len(), 3);

    let band = chain.sent_packet(0);
    let chain_params = chain.sent_packet(1);
    let incentivized = chain.sent_packet(2);
    chain.block(|module, ctx| {
        module
            .on_acknowledgement_packet(ctx, &band, &band_request_ack(band_request_id))
            .unwrap();
        module
            .on_acknowledgement_packet(ctx, &chain_params, &icq_ack(chain_params_values()))
            .unwrap();
        module
            .on_acknowledgement_packet(ctx, &incentivized, &icq_ack(vec![incentivized_pools_value(&[(1, 1), (1, 2)])]))
            .unwrap();
    });
    assert_eq!(chain.transport.sent.len(), 4);
}
