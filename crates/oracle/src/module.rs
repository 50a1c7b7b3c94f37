//! Qoracle module: packet routing and block hooks

use std::sync::Arc;
use tracing::warn;

use qoracle_bandchain::BandchainKeeper;
use qoracle_core::{Acknowledgement, Context, CoreError, CoreResult, Packet, WiringResult};
use qoracle_osmosis::OsmosisKeeper;

use crate::keeper::QOracleKeeper;
use crate::registry::OracleRegistry;

const LOG_TARGET: &str = "x/qoracle";

/// Submodule owning a port
enum Route<'a> {
    Bandchain(&'a BandchainKeeper),
    Osmosis(&'a OsmosisKeeper),
}

/// The oracle with its Bandchain price source and Osmosis pool source wired in
#[derive(Debug, Clone)]
pub struct QOracleModule {
    keeper: QOracleKeeper,
    bandchain: Arc<BandchainKeeper>,
    osmosis: Arc<OsmosisKeeper>,
}

impl QOracleModule {
    pub fn new(bandchain: BandchainKeeper, osmosis: OsmosisKeeper) -> WiringResult<Self> {
        let bandchain = Arc::new(bandchain);
        let osmosis = Arc::new(osmosis);
        let registry = OracleRegistry::builder()
            .price_oracle(bandchain.clone())
            .pool_oracle(osmosis.clone())
            .seal()?;
        Ok(Self {
            keeper: QOracleKeeper::new(registry),
            bandchain,
            osmosis,
        })
    }

    pub fn keeper(&self) -> &QOracleKeeper {
        &self.keeper
    }

    pub fn bandchain(&self) -> &BandchainKeeper {
        &self.bandchain
    }

    pub fn osmosis(&self) -> &OsmosisKeeper {
        &self.osmosis
    }

    fn route(&self, port: &str) -> CoreResult<Route<'_>> {
        if port == self.bandchain.port_id() {
            Ok(Route::Bandchain(&self.bandchain))
        } else if port == self.osmosis.port_id() {
            Ok(Route::Osmosis(&self.osmosis))
        } else {
            Err(CoreError::UnknownSource(format!("no submodule bound to port {port}")))
        }
    }

    pub fn on_recv_packet(&self, ctx: &mut Context, packet: &Packet) -> Acknowledgement {
        match self.route(&packet.destination_port) {
            Ok(Route::Bandchain(keeper)) => keeper.on_recv_packet(ctx, packet),
            Ok(Route::Osmosis(keeper)) => keeper.on_recv_packet(ctx, packet),
            Err(e) => {
                warn!(target: LOG_TARGET, packet_seq = packet.sequence, error = %e, "Rejected packet");
                Acknowledgement::error(e)
            }
        }
    }

    /// `acknowledgement` is the raw envelope as relayed
    pub fn on_acknowledgement_packet(&self, ctx: &mut Context, packet: &Packet, acknowledgement: &[u8]) -> CoreResult<()> {
        let route = self.route(&packet.source_port)?;
        let ack = Acknowledgement::decode(acknowledgement)?;
        match route {
            Route::Bandchain(keeper) => keeper.on_acknowledgement_packet(ctx, packet, &ack),
            Route::Osmosis(keeper) => keeper.on_acknowledgement_packet(ctx, packet, &ack),
        }
    }

    pub fn on_timeout_packet(&self, ctx: &mut Context, packet: &Packet) -> CoreResult<()> {
        match self.route(&packet.source_port)? {
            Route::Bandchain(keeper) => keeper.on_timeout_packet(ctx, packet),
            Route::Osmosis(keeper) => keeper.on_timeout_packet(ctx, packet),
        }
    }

    pub fn begin_block(&self, ctx: &mut Context) -> CoreResult<()> {
        self.keeper.init_mem_store(ctx)
    }

    pub fn end_block(&self, ctx: &mut Context) -> CoreResult<()> {
        self.keeper.update_mem_store(ctx)
    }

    /// Periodic trigger fanned out to both submodules
    pub fn after_epoch_end(&self, ctx: &mut Context, epoch_identifier: &str) {
        self.bandchain.after_epoch_end(ctx, epoch_identifier);
        self.osmosis.after_epoch_end(ctx, epoch_identifier);
    }
}
