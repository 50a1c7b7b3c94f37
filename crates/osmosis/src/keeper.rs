//! Osmosis pools keeper
//!
//! Keeps a cache of osmosis chain parameters and incentivized balancer pools, fed by three
//! interchain query batches. The incentivized pools batch is followed by a pools batch
//! asking for every pool it listed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use qoracle_core::correlator::{accept, check_sequence};
use qoracle_core::{
    Acknowledgement, Context, CoreError, CoreResult, DenomPrices, Event, OutgoingPacket, Packet, Pool, PoolOracle,
    PreparedRequest, TryUpdateOutcome, ATTRIBUTE_ERROR, ATTRIBUTE_KIND, ATTRIBUTE_PACKET_SEQUENCE,
};

use crate::metrics::{calculate_pool_tvl, ApyCalculator};
use crate::proto;
use crate::queries::{self, InterchainQueryPacketAck, InterchainQueryPacketData, RemoteUpdate, RequestKind};
use crate::types::*;

const LOG_TARGET: &str = "x/qoracle/osmosis";

#[derive(Debug, Clone)]
pub struct OsmosisKeeper {
    port_id: String,
}

impl Default for OsmosisKeeper {
    fn default() -> Self {
        Self::new(PORT_ID)
    }
}

impl OsmosisKeeper {
    pub fn new(port_id: impl Into<String>) -> Self {
        Self { port_id: port_id.into() }
    }

    pub fn port_id(&self) -> &str {
        &self.port_id
    }

    pub fn params(&self, ctx: &Context) -> CoreResult<Params> {
        Ok(ctx.store().get(PARAMS_KEY)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &Params) -> CoreResult<()> {
        params.validate()?;
        ctx.store_mut().set(PARAMS_KEY, params)
    }

    pub fn is_enabled(&self, ctx: &Context) -> CoreResult<bool> {
        Ok(self.params(ctx)?.enabled)
    }

    pub fn request_state(&self, ctx: &Context, kind: RequestKind) -> CoreResult<IcqRequestState> {
        kind.tracker().load(ctx)
    }

    pub fn chain_params_state(&self, ctx: &Context) -> CoreResult<IcqRequestState> {
        self.request_state(ctx, RequestKind::ChainParams)
    }

    pub fn incentivized_pools_state(&self, ctx: &Context) -> CoreResult<IcqRequestState> {
        self.request_state(ctx, RequestKind::IncentivizedPools)
    }

    pub fn pools_state(&self, ctx: &Context) -> CoreResult<IcqRequestState> {
        self.request_state(ctx, RequestKind::Pools)
    }

    // Remote parameter cache

    pub fn epochs_info(&self, ctx: &Context) -> CoreResult<Vec<EpochInfo>> {
        ctx.store().prefix_values(EPOCHS_INFO_PREFIX)
    }

    pub fn epoch_info(&self, ctx: &Context, identifier: &str) -> CoreResult<Option<EpochInfo>> {
        ctx.store().get(&epoch_key(identifier))
    }

    pub fn pools(&self, ctx: &Context) -> CoreResult<Vec<BalancerPool>> {
        ctx.store().prefix_values(POOLS_PREFIX)
    }

    pub fn pool(&self, ctx: &Context, id: u64) -> CoreResult<Option<BalancerPool>> {
        ctx.store().get(&pool_key(id))
    }

    pub fn pools_updated_at(&self, ctx: &Context) -> CoreResult<Option<DateTime<Utc>>> {
        ctx.store().get(POOLS_UPDATED_AT_KEY)
    }

    pub fn lockable_durations(&self, ctx: &Context) -> CoreResult<Vec<Duration>> {
        Ok(ctx.store().get(LOCKABLE_DURATIONS_KEY)?.unwrap_or_default())
    }

    pub fn mint_params(&self, ctx: &Context) -> CoreResult<Option<MintParams>> {
        ctx.store().get(MINT_PARAMS_KEY)
    }

    pub fn mint_epoch_provisions(&self, ctx: &Context) -> CoreResult<Option<Decimal>> {
        ctx.store().get(MINT_EPOCH_PROVISIONS_KEY)
    }

    pub fn incentivized_pools(&self, ctx: &Context) -> CoreResult<Vec<IncentivizedPool>> {
        Ok(ctx.store().get(INCENTIVIZED_POOLS_KEY)?.unwrap_or_default())
    }

    pub fn distr_info(&self, ctx: &Context) -> CoreResult<Option<DistrInfo>> {
        ctx.store().get(DISTR_INFO_KEY)
    }

    pub fn chain_params_snapshot(&self, ctx: &Context) -> CoreResult<ChainParamsSnapshot> {
        Ok(ChainParamsSnapshot {
            epochs: self.epochs_info(ctx)?,
            mint_params: self.mint_params(ctx)?,
            epoch_provisions: self.mint_epoch_provisions(ctx)?,
            incentivized_pools: self.incentivized_pools(ctx)?,
            distr_info: self.distr_info(ctx)?,
        })
    }

    fn clear_pools(&self, ctx: &mut Context) {
        let removed = ctx.store_mut().delete_prefix(POOLS_PREFIX);
        debug!(target: LOG_TARGET, removed, "Cleared stored pools");
    }

    /// Encode every update first, then replace the stored data in one go
    fn apply(&self, ctx: &mut Context, kind: RequestKind, updates: &[RemoteUpdate]) -> CoreResult<()> {
        let mut cleared: Vec<&'static [u8]> = Vec::new();
        let mut writes: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(updates.len());
        for update in updates {
            match update {
                RemoteUpdate::EpochsInfo(epochs) => {
                    cleared.push(EPOCHS_INFO_PREFIX);
                    for epoch in epochs {
                        writes.push((epoch_key(&epoch.identifier), serde_json::to_vec(epoch)?));
                    }
                }
                RemoteUpdate::Pool(pool) => writes.push((pool_key(pool.id), serde_json::to_vec(pool)?)),
                RemoteUpdate::LockableDurations(durations) => {
                    writes.push((LOCKABLE_DURATIONS_KEY.to_vec(), serde_json::to_vec(durations)?))
                }
                RemoteUpdate::MintParams(params) => writes.push((MINT_PARAMS_KEY.to_vec(), serde_json::to_vec(params)?)),
                RemoteUpdate::MintEpochProvisions(provisions) => {
                    writes.push((MINT_EPOCH_PROVISIONS_KEY.to_vec(), serde_json::to_vec(provisions)?))
                }
                RemoteUpdate::IncentivizedPools(pools) => {
                    writes.push((INCENTIVIZED_POOLS_KEY.to_vec(), serde_json::to_vec(pools)?))
                }
                RemoteUpdate::DistrInfo(info) => writes.push((DISTR_INFO_KEY.to_vec(), serde_json::to_vec(info)?)),
            }
        }
        if kind == RequestKind::Pools {
            writes.push((POOLS_UPDATED_AT_KEY.to_vec(), serde_json::to_vec(&ctx.block_time())?));
            self.clear_pools(ctx);
        }

        let store = ctx.store_mut();
        for prefix in cleared {
            store.delete_prefix(prefix);
        }
        for (key, value) in writes {
            store.set_raw(key, value);
        }
        Ok(())
    }

    /// Epoch hook: refresh chain params and the incentivized pools list
    pub fn after_epoch_end(&self, ctx: &mut Context, epoch_identifier: &str) {
        let params = match self.params(ctx) {
            Ok(params) => params,
            Err(e) => {
                error!(target: LOG_TARGET, error = %e, "Could not load osmosis params");
                return;
            }
        };
        if epoch_identifier != params.epoch_identifier {
            return;
        }
        if let Err(e) = self.try_update_chain_params(ctx) {
            error!(target: LOG_TARGET, error = %e, "Could not send chain params request to osmosis");
        }
        if let Err(e) = self.try_update_incentivized_pools(ctx) {
            error!(target: LOG_TARGET, error = %e, "Could not send incentivized pools request to osmosis");
        }
    }

    pub fn try_update_chain_params(&self, ctx: &mut Context) -> CoreResult<TryUpdateOutcome> {
        self.send_batch(ctx, RequestKind::ChainParams, queries::chain_params_batch())
    }

    pub fn try_update_incentivized_pools(&self, ctx: &mut Context) -> CoreResult<TryUpdateOutcome> {
        self.send_batch(ctx, RequestKind::IncentivizedPools, queries::incentivized_pools_batch())
    }

    /// Ask for every incentivized pool. Without incentivized pools the stored pools are dropped.
    pub fn try_update_pools(&self, ctx: &mut Context) -> CoreResult<TryUpdateOutcome> {
        if !self.is_enabled(ctx)? {
            return Ok(TryUpdateOutcome::Disabled);
        }
        // Stored pools belong to the in-flight request until it settles
        let state = self.pools_state(ctx)?;
        if state.is_pending() {
            info!(
                target: LOG_TARGET,
                state_seq = state.request_sequence,
                started_at = state.started_at_height,
                "Pools request still pending, keeping stored pools"
            );
            return Ok(TryUpdateOutcome::AlreadyPending);
        }
        let pool_ids = unique_pool_ids(&self.incentivized_pools(ctx)?);
        if pool_ids.is_empty() {
            info!(target: LOG_TARGET, "No incentivized pools, clearing stored pools");
            self.clear_pools(ctx);
            ctx.flags.pool_dirty = true;
            return Ok(TryUpdateOutcome::Skipped);
        }
        self.send_batch(ctx, RequestKind::Pools, queries::pools_batch(&pool_ids))
    }

    fn send_batch(
        &self,
        ctx: &mut Context,
        kind: RequestKind,
        requests: Vec<proto::RequestQuery>,
    ) -> CoreResult<TryUpdateOutcome> {
        let params = self.params(ctx)?;
        kind.tracker().try_update::<IcqCallData, IcqResult, _>(ctx, params.enabled, |ctx| {
            let call_data = IcqCallData {
                paths: requests.iter().map(|r| r.path.clone()).collect(),
            };
            let packet_data = queries::packet_data(kind, requests);
            debug!(target: LOG_TARGET, kind = %kind, queries = call_data.paths.len(), "Built interchain query batch");

            Ok(PreparedRequest {
                client_id: kind.memo().to_string(),
                call_data,
                packet: OutgoingPacket {
                    source_port: self.port_id.clone(),
                    source_channel: params.ibc.authorized_channel.clone(),
                    data: packet_data.to_bytes()?,
                    timeout: params.ibc.packet_timeout(&ctx.header()),
                },
            })
        })
    }

    /// The query host never sends packets to this port
    pub fn on_recv_packet(&self, _ctx: &mut Context, packet: &Packet) -> Acknowledgement {
        warn!(target: LOG_TARGET, packet_seq = packet.sequence, "Unexpected packet on interchain query port");
        Acknowledgement::error(CoreError::InvalidPacket("interchain query port does not accept packets".to_string()))
    }

    pub fn on_acknowledgement_packet(&self, ctx: &mut Context, packet: &Packet, ack: &Acknowledgement) -> CoreResult<()> {
        let data = InterchainQueryPacketData::from_bytes(&packet.data)?;
        let kind = RequestKind::from_memo(&data.memo)?;
        let tracker = kind.tracker();

        let state: IcqRequestState = tracker.load(ctx)?;
        if !accept(tracker.kind(), packet.sequence, check_sequence(&state, packet.sequence)) {
            return Ok(());
        }

        let event = Event::new(EVENT_TYPE_OSMOSIS_ACKNOWLEDGEMENT)
            .attr(ATTRIBUTE_KIND, kind)
            .attr(ATTRIBUTE_PACKET_SEQUENCE, packet.sequence);

        let bz = match ack {
            Acknowledgement::Error(msg) => {
                tracker.update(ctx, |s: &mut IcqRequestState| s.fail())?;
                ctx.emit(event.attr(ATTRIBUTE_ERROR, msg));
                warn!(target: LOG_TARGET, kind = %kind, packet_seq = packet.sequence, error = %msg, "Interchain query rejected by osmosis");
                return Ok(());
            }
            Acknowledgement::Result(bz) => bz,
        };

        let (updates, height) = match decode_ack(&data, bz) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracker.update(ctx, |s: &mut IcqRequestState| s.fail())?;
                ctx.emit(event.attr(ATTRIBUTE_ERROR, &e));
                warn!(target: LOG_TARGET, kind = %kind, packet_seq = packet.sequence, error = %e, "Interchain query batch failed");
                return match e {
                    CoreError::FailedQueryResponse { .. } => Ok(()),
                    e => Err(e),
                };
            }
        };

        let responses = updates.len();
        self.apply(ctx, kind, &updates)?;
        tracker.update(ctx, |s: &mut IcqRequestState| {
            s.resolve(IcqResult { responses, height }, packet.sequence)
        })?;
        ctx.emit(event.attr(ATTRIBUTE_RESPONSES, responses));
        info!(target: LOG_TARGET, kind = %kind, packet_seq = packet.sequence, responses, "Interchain query batch applied");

        match kind {
            RequestKind::ChainParams | RequestKind::Pools => ctx.flags.pool_dirty = true,
            RequestKind::IncentivizedPools => {
                if let Err(e) = self.try_update_pools(ctx) {
                    error!(target: LOG_TARGET, error = %e, "Could not send pools request to osmosis");
                }
            }
        }
        Ok(())
    }

    pub fn on_timeout_packet(&self, ctx: &mut Context, packet: &Packet) -> CoreResult<()> {
        let data = InterchainQueryPacketData::from_bytes(&packet.data)?;
        let kind = RequestKind::from_memo(&data.memo)?;
        let tracker = kind.tracker();

        let state: IcqRequestState = tracker.load(ctx)?;
        if !accept(tracker.kind(), packet.sequence, check_sequence(&state, packet.sequence)) {
            return Ok(());
        }

        tracker.update(ctx, |s: &mut IcqRequestState| s.fail())?;
        ctx.emit(
            Event::new(EVENT_TYPE_OSMOSIS_ACKNOWLEDGEMENT)
                .attr(ATTRIBUTE_KIND, kind)
                .attr(ATTRIBUTE_PACKET_SEQUENCE, packet.sequence)
                .attr(ATTRIBUTE_ERROR, "packet timed out"),
        );
        warn!(target: LOG_TARGET, kind = %kind, packet_seq = packet.sequence, "Interchain query timed out");
        Ok(())
    }
}

/// Staged updates of a successful batch plus the remote height it was answered at
fn decode_ack(data: &InterchainQueryPacketData, bz: &[u8]) -> CoreResult<(Vec<RemoteUpdate>, i64)> {
    let responses = InterchainQueryPacketAck::from_bytes(bz)?.responses()?;
    let requests = data.requests()?;
    let updates = queries::decode_batch(&requests, &responses)?;
    let height = responses.first().map(|r| r.height).unwrap_or_default();
    Ok((updates, height))
}

impl PoolOracle for OsmosisKeeper {
    fn source(&self) -> &str {
        SUBMODULE_NAME
    }

    fn get_pools(&self, ctx: &Context, prices: &DenomPrices) -> CoreResult<Vec<Pool>> {
        let snapshot = self.chain_params_snapshot(ctx)?;
        let calculator = ApyCalculator::new(&snapshot, prices)?;
        let updated_at = self.pools_updated_at(ctx)?.unwrap_or_else(|| ctx.block_time());

        let mut pools = Vec::new();
        for pool in self.pools(ctx)? {
            let assets = pool.coins();
            let metrics = calculate_pool_tvl(&assets, prices)
                .and_then(|tvl| calculator.calculate(pool.id, tvl).map(|apy| (tvl, apy)));
            match metrics {
                Ok((tvl, apy)) => pools.push(Pool {
                    id: pool.id.to_string(),
                    assets,
                    tvl,
                    apy,
                    updated_at,
                }),
                Err(e) => warn!(target: LOG_TARGET, pool_id = pool.id, error = %e, "Skipping pool without metrics"),
            }
        }
        Ok(pools)
    }
}
