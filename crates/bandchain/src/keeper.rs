//! Bandchain coin rates keeper
//!
//! Lifecycle of one coin rates request:
//! 1. `try_update_coin_rates` sends an oracle request packet (state Pending)
//! 2. the request packet ack carries the oracle request id
//! 3. a response packet carrying that request id resolves or fails the state
//!
//! A resolved state turns into the symbol price list and marks prices dirty.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use qoracle_core::correlator::{accept, check_request_id, check_sequence};
use qoracle_core::{
    Acknowledgement, Context, CoreError, CoreResult, Event, OutgoingPacket, Packet, PreparedRequest, PriceOracle,
    SymbolPriceList, TryUpdateOutcome, ATTRIBUTE_ERROR, ATTRIBUTE_PACKET_SEQUENCE,
};

use crate::obi::ObiEncode;
use crate::types::*;

const LOG_TARGET: &str = "x/qoracle/bandchain";

#[derive(Debug, Clone)]
pub struct BandchainKeeper {
    port_id: String,
}

impl Default for BandchainKeeper {
    fn default() -> Self {
        Self::new(PORT_ID)
    }
}

impl BandchainKeeper {
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

    pub fn coin_rates_state(&self, ctx: &Context) -> CoreResult<OracleScriptState> {
        COIN_RATES.load(ctx)
    }

    /// Last stored price list, regardless of its age
    pub fn symbol_price_list(&self, ctx: &Context) -> CoreResult<Option<SymbolPriceList>> {
        ctx.store().get(SYMBOL_PRICE_LIST_KEY)
    }

    /// Epoch hook: request fresh coin rates at the end of the configured epoch
    pub fn after_epoch_end(&self, ctx: &mut Context, epoch_identifier: &str) {
        let params = match self.params(ctx) {
            Ok(params) => params,
            Err(e) => {
                error!(target: LOG_TARGET, error = %e, "Could not load bandchain params");
                return;
            }
        };
        if epoch_identifier != params.coin_rates.epoch_identifier {
            return;
        }
        if let Err(e) = self.try_update_coin_rates(ctx) {
            error!(target: LOG_TARGET, error = %e, "Could not send coin rates request to bandchain");
        }
    }

    pub fn try_update_coin_rates(&self, ctx: &mut Context) -> CoreResult<TryUpdateOutcome> {
        let params = self.params(ctx)?;
        COIN_RATES.try_update::<OracleCallData, OracleResult, _>(ctx, params.enabled, |ctx| {
            let call_data = CoinRatesCallData {
                symbols: params.coin_rates.symbols.clone(),
                multiplier: params.coin_rates.multiplier,
            };
            let packet_data = OracleRequestPacketData::new(
                COIN_RATES_CLIENT_ID,
                &params.coin_rates.script_params,
                call_data.obi_encode()?,
            );
            debug!(target: LOG_TARGET, calldata = %calldata_digest(&packet_data.calldata), "Built coin rates request");

            Ok(PreparedRequest {
                client_id: COIN_RATES_CLIENT_ID.to_string(),
                call_data: OracleCallData::CoinRates(call_data),
                packet: OutgoingPacket {
                    source_port: self.port_id.clone(),
                    source_channel: params.ibc.authorized_channel.clone(),
                    data: packet_data.to_bytes()?,
                    timeout: params.ibc.packet_timeout(&ctx.header()),
                },
            })
        })
    }

    /// Handle an oracle response packet. Errors become an error acknowledgement.
    pub fn on_recv_packet(&self, ctx: &mut Context, packet: &Packet) -> Acknowledgement {
        match self.handle_recv_packet(ctx, packet) {
            Ok(result) => Acknowledgement::success(result),
            Err(e) => {
                warn!(target: LOG_TARGET, packet_seq = packet.sequence, error = %e, "Rejected oracle response packet");
                Acknowledgement::error(e)
            }
        }
    }

    fn handle_recv_packet(&self, ctx: &mut Context, packet: &Packet) -> CoreResult<Vec<u8>> {
        let params = self.params(ctx)?;
        if !params.enabled {
            return Err(CoreError::Disabled(SUBMODULE_NAME.to_string()));
        }
        if packet.destination_channel != params.ibc.authorized_channel {
            return Err(CoreError::UnauthorizedPacket {
                port: packet.destination_port.clone(),
                channel: packet.destination_channel.clone(),
            });
        }

        let data = OracleResponsePacketData::from_bytes(&packet.data)?;
        match data.client_id.as_str() {
            COIN_RATES_CLIENT_ID => self.handle_coin_rates_response(ctx, packet, &data)?,
            other => return Err(CoreError::UnknownSource(other.to_string())),
        }

        let ack = OracleRequestPacketAcknowledgement {
            request_id: data.request_id,
        };
        Ok(serde_json::to_vec(&ack)?)
    }

    fn handle_coin_rates_response(
        &self,
        ctx: &mut Context,
        packet: &Packet,
        data: &OracleResponsePacketData,
    ) -> CoreResult<()> {
        let state = COIN_RATES.load::<OracleCallData, OracleResult>(ctx)?;
        if !accept(COIN_RATES.kind(), packet.sequence, check_request_id(&state, data.request_id)) {
            return Ok(());
        }

        let response_event = Event::new(EVENT_TYPE_ORACLE_RESPONSE)
            .attr(ATTRIBUTE_PACKET_SEQUENCE, packet.sequence)
            .attr(ATTRIBUTE_REQUEST_ID, data.request_id)
            .attr(ATTRIBUTE_RESOLVE_STATUS, data.resolve_status);

        if data.resolve_status != ResolveStatus::Success {
            self.fail_coin_rates(ctx, packet.sequence)?;
            ctx.emit(response_event);
            warn!(
                target: LOG_TARGET,
                request_id = data.request_id,
                status = %data.resolve_status,
                "Coin rates request was not resolved successfully"
            );
            return Ok(());
        }

        let decoded = decode_result(&data.client_id, &data.result)
            .and_then(|result| self.build_price_list(&state.call_data, &result, ctx.block_time()).map(|list| (result, list)));
        let (result, price_list) = match decoded {
            Ok(decoded) => decoded,
            // The packet itself is acknowledged so the host commits the Failed state
            Err(e) => {
                self.fail_coin_rates(ctx, packet.sequence)?;
                ctx.emit(response_event.attr(ATTRIBUTE_ERROR, &e));
                warn!(
                    target: LOG_TARGET,
                    request_id = data.request_id,
                    error = %e,
                    "Could not decode coin rates result"
                );
                return Ok(());
            }
        };

        COIN_RATES.update(ctx, |s: &mut OracleScriptState| s.resolve(result, packet.sequence))?;
        ctx.store_mut().set(SYMBOL_PRICE_LIST_KEY, &price_list)?;
        ctx.flags.price_dirty = true;
        ctx.emit(response_event);

        info!(
            target: LOG_TARGET,
            request_id = data.request_id,
            symbols = price_list.prices.len(),
            "Updated symbol price list"
        );
        Ok(())
    }

    fn fail_coin_rates(&self, ctx: &mut Context, result_sequence: u64) -> CoreResult<()> {
        COIN_RATES.update(ctx, |s: &mut OracleScriptState| {
            s.result_sequence = result_sequence;
            s.fail();
        })?;
        Ok(())
    }

    /// `price = rate / multiplier` for every requested symbol
    fn build_price_list(
        &self,
        call_data: &OracleCallData,
        result: &OracleResult,
        now: DateTime<Utc>,
    ) -> CoreResult<SymbolPriceList> {
        let (OracleCallData::CoinRates(call_data), OracleResult::CoinRates(result)) = (call_data, result);
        if call_data.symbols.len() != result.rates.len() {
            return Err(CoreError::ResultDecode(format!(
                "coin rates result has {} rates for {} symbols",
                result.rates.len(),
                call_data.symbols.len()
            )));
        }

        let multiplier = Decimal::from(call_data.multiplier);
        let mut list = SymbolPriceList::new(now);
        for (symbol, rate) in call_data.symbols.iter().zip(&result.rates) {
            let price = Decimal::from(*rate)
                .checked_div(multiplier)
                .ok_or_else(|| CoreError::DivideByZero(format!("coin rates multiplier for {symbol}")))?;
            list.prices.insert(symbol.clone(), price);
        }
        Ok(list)
    }

    pub fn on_acknowledgement_packet(&self, ctx: &mut Context, packet: &Packet, ack: &Acknowledgement) -> CoreResult<()> {
        let data = OracleRequestPacketData::from_bytes(&packet.data)?;
        if data.client_id != COIN_RATES_CLIENT_ID {
            return Err(CoreError::UnknownSource(data.client_id));
        }

        let state = COIN_RATES.load::<OracleCallData, OracleResult>(ctx)?;
        if !accept(COIN_RATES.kind(), packet.sequence, check_sequence(&state, packet.sequence)) {
            return Ok(());
        }

        let event = Event::new(EVENT_TYPE_ORACLE_ACKNOWLEDGEMENT).attr(ATTRIBUTE_PACKET_SEQUENCE, packet.sequence);
        match ack {
            Acknowledgement::Error(msg) => {
                COIN_RATES.update(ctx, |s: &mut OracleScriptState| s.fail())?;
                ctx.emit(event.attr(ATTRIBUTE_ERROR, msg));
                warn!(target: LOG_TARGET, packet_seq = packet.sequence, error = %msg, "Coin rates request rejected by bandchain");
            }
            Acknowledgement::Result(bz) => {
                let ack_data: OracleRequestPacketAcknowledgement = match serde_json::from_slice(bz) {
                    Ok(ack_data) => ack_data,
                    Err(e) => {
                        let err = CoreError::InvalidAcknowledgement(format!("oracle request acknowledgement: {e}"));
                        COIN_RATES.update(ctx, |s: &mut OracleScriptState| s.fail())?;
                        ctx.emit(event.attr(ATTRIBUTE_ERROR, &err));
                        return Err(err);
                    }
                };
                COIN_RATES.update(ctx, |s: &mut OracleScriptState| s.request_id = Some(ack_data.request_id))?;
                ctx.emit(event.attr(ATTRIBUTE_REQUEST_ID, ack_data.request_id));
                debug!(target: LOG_TARGET, packet_seq = packet.sequence, request_id = ack_data.request_id, "Coin rates request acknowledged");
            }
        }
        Ok(())
    }

    pub fn on_timeout_packet(&self, ctx: &mut Context, packet: &Packet) -> CoreResult<()> {
        let data = OracleRequestPacketData::from_bytes(&packet.data)?;
        if data.client_id != COIN_RATES_CLIENT_ID {
            return Err(CoreError::UnknownSource(data.client_id));
        }

        let state = COIN_RATES.load::<OracleCallData, OracleResult>(ctx)?;
        if !accept(COIN_RATES.kind(), packet.sequence, check_sequence(&state, packet.sequence)) {
            return Ok(());
        }

        COIN_RATES.update(ctx, |s: &mut OracleScriptState| s.fail())?;
        ctx.emit(
            Event::new(EVENT_TYPE_ORACLE_ACKNOWLEDGEMENT)
                .attr(ATTRIBUTE_PACKET_SEQUENCE, packet.sequence)
                .attr(ATTRIBUTE_ERROR, "packet timed out"),
        );
        warn!(target: LOG_TARGET, packet_seq = packet.sequence, "Coin rates request timed out");
        Ok(())
    }
}

impl PriceOracle for BandchainKeeper {
    fn source(&self) -> &str {
        SUBMODULE_NAME
    }

    fn get_symbol_price_list(&self, ctx: &Context) -> CoreResult<SymbolPriceList> {
        let params = self.params(ctx)?;
        let list = self
            .symbol_price_list(ctx)?
            .ok_or_else(|| CoreError::PriceListUnavailable("no coin rates result received yet".to_string()))?;

        let lifetime = Duration::nanoseconds(i64::try_from(params.price_list_exp_duration).unwrap_or(i64::MAX));
        if let Some(expires_at) = list.updated_at.checked_add_signed(lifetime) {
            if ctx.block_time() > expires_at {
                return Err(CoreError::PriceListExpired {
                    updated_at: list.updated_at.to_rfc3339(),
                    expires_at: expires_at.to_rfc3339(),
                });
            }
        }
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obi::ObiDecode;
    use qoracle_core::testutil::{header_at, MockTransport};
    use qoracle_core::{Height, MultiStore, RequestStatus};
    use rust_decimal_macros::dec;

    const CHANNEL: &str = "channel-0";

    fn setup(ctx: &mut Context, symbols: &[&str]) {
        let mut params = Params::default();
        params.ibc.authorized_channel = CHANNEL.to_string();
        params.coin_rates.symbols = symbols.iter().map(|s| s.to_string()).collect();
        BandchainKeeper::default().set_params(ctx, &params).unwrap();
    }

    fn request_packet(transport: &MockTransport, sequence: u64) -> Packet {
        let sent = transport.last_sent().unwrap();
        Packet {
            sequence,
            source_port: sent.source_port.clone(),
            source_channel: sent.source_channel.clone(),
            destination_port: "oracle".to_string(),
            destination_channel: "channel-9".to_string(),
            data: sent.data.clone(),
            timeout_height: Height::default(),
            timeout_timestamp: sent.timeout.timestamp,
        }
    }

    fn response_packet(sequence: u64, request_id: u64, status: ResolveStatus, rates: &[u64]) -> Packet {
        let data = OracleResponsePacketData {
            client_id: COIN_RATES_CLIENT_ID.to_string(),
            request_id,
            ans_count: 4,
            request_time: 1_654_041_600,
            resolve_time: 1_654_041_610,
            resolve_status: status,
            result: CoinRatesResult { rates: rates.to_vec() }.obi_encode().unwrap(),
        };
        Packet {
            sequence,
            source_port: "oracle".to_string(),
            source_channel: "channel-9".to_string(),
            destination_port: PORT_ID.to_string(),
            destination_channel: CHANNEL.to_string(),
            data: data.to_bytes().unwrap(),
            timeout_height: Height::default(),
            timeout_timestamp: 0,
        }
    }

    fn request_id_ack(request_id: u64) -> Acknowledgement {
        Acknowledgement::success(format!(r#"{{"request_id":"{request_id}"}}"#).into_bytes())
    }

    #[test]
    fn test_coin_rates_full_cycle() {
        let keeper = BandchainKeeper::default();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::with_channel(PORT_ID, CHANNEL);

        let request = {
            let mut ctx = Context::new(header_at(10), &mut stores, &mut transport);
            setup(&mut ctx, &["BTC"]);
            assert_eq!(keeper.try_update_coin_rates(&mut ctx).unwrap(), TryUpdateOutcome::Sent(1));
            drop(ctx);
            request_packet(&transport, 1)
        };

        let sent = OracleRequestPacketData::from_bytes(&request.data).unwrap();
        assert_eq!(sent.oracle_script_id, 37);
        let call_data = CoinRatesCallData::obi_decode(&sent.calldata).unwrap();
        assert_eq!(call_data.symbols, vec!["BTC".to_string()]);

        let mut ctx = Context::new(header_at(11), &mut stores, &mut transport);
        keeper.on_acknowledgement_packet(&mut ctx, &request, &request_id_ack(12)).unwrap();
        assert_eq!(keeper.coin_rates_state(&ctx).unwrap().request_id, Some(12));

        let ack = keeper.on_recv_packet(&mut ctx, &response_packet(3, 12, ResolveStatus::Success, &[50_000_000_000]));
        assert!(ack.is_success());
        assert!(ctx.flags.price_dirty);

        let state = keeper.coin_rates_state(&ctx).unwrap();
        assert_eq!(state.status(), RequestStatus::Resolved);
        assert_eq!(state.result_sequence, 3);
        assert_eq!(state.updated_at_height, 11);

        let list = keeper.get_symbol_price_list(&ctx).unwrap();
        assert_eq!(list.get("BTC"), Some(dec!(50000)));
        assert_eq!(list.updated_at, header_at(11).time);
    }

    #[test]
    fn test_failed_resolve_status() {
        let keeper = BandchainKeeper::default();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::with_channel(PORT_ID, CHANNEL);
        let mut ctx = Context::new(header_at(10), &mut stores, &mut transport);
        setup(&mut ctx, &["BTC", "ATOM"]);
        keeper.try_update_coin_rates(&mut ctx).unwrap();
        drop(ctx);
        let request = request_packet(&transport, 1);

        let mut ctx = Context::new(header_at(11), &mut stores, &mut transport);
        keeper.on_acknowledgement_packet(&mut ctx, &request, &request_id_ack(5)).unwrap();
        let ack = keeper.on_recv_packet(&mut ctx, &response_packet(2, 5, ResolveStatus::Expired, &[]));
        assert!(ack.is_success());
        assert_eq!(keeper.coin_rates_state(&ctx).unwrap().status(), RequestStatus::Failed);
        assert!(!ctx.flags.price_dirty);
        assert!(matches!(
            keeper.get_symbol_price_list(&ctx),
            Err(CoreError::PriceListUnavailable(_))
        ));
    }

    #[test]
    fn test_undecodable_result_fails_request() {
        let keeper = BandchainKeeper::default();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::with_channel(PORT_ID, CHANNEL);
        let mut ctx = Context::new(header_at(10), &mut stores, &mut transport);
        setup(&mut ctx, &["BTC", "ATOM"]);
        keeper.try_update_coin_rates(&mut ctx).unwrap();
        drop(ctx);
        let request = request_packet(&transport, 1);

        let mut ctx = Context::new(header_at(11), &mut stores, &mut transport);
        keeper.on_acknowledgement_packet(&mut ctx, &request, &request_id_ack(5)).unwrap();
        // Acknowledged as received so the Failed state is kept by the host
        let ack = keeper.on_recv_packet(&mut ctx, &response_packet(2, 5, ResolveStatus::Success, &[1]));
        assert!(ack.is_success());
        let state = keeper.coin_rates_state(&ctx).unwrap();
        assert_eq!(state.status(), RequestStatus::Failed);
        assert_eq!(state.result_sequence, 2);
        assert!(keeper.symbol_price_list(&ctx).unwrap().is_none());
        assert!(!ctx.flags.price_dirty);
        assert!(ctx.events().last().unwrap().attribute(ATTRIBUTE_ERROR).is_some());

        // Undecodable result bytes take the same path
        drop(ctx);
        let mut ctx = Context::new(header_at(12), &mut stores, &mut transport);
        keeper.try_update_coin_rates(&mut ctx).unwrap();
        drop(ctx);
        let request = request_packet(&transport, 2);
        let mut ctx = Context::new(header_at(13), &mut stores, &mut transport);
        keeper.on_acknowledgement_packet(&mut ctx, &request, &request_id_ack(6)).unwrap();
        let mut packet = response_packet(4, 6, ResolveStatus::Success, &[]);
        let mut data = OracleResponsePacketData::from_bytes(&packet.data).unwrap();
        data.result = vec![0, 0];
        packet.data = data.to_bytes().unwrap();
        assert!(keeper.on_recv_packet(&mut ctx, &packet).is_success());
        assert_eq!(keeper.coin_rates_state(&ctx).unwrap().status(), RequestStatus::Failed);
    }

    #[test]
    fn test_inconsistent_packets_leave_state_unchanged() {
        let keeper = BandchainKeeper::default();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::with_channel(PORT_ID, CHANNEL);
        let mut ctx = Context::new(header_at(10), &mut stores, &mut transport);
        setup(&mut ctx, &["BTC"]);
        keeper.try_update_coin_rates(&mut ctx).unwrap();
        drop(ctx);
        let request = request_packet(&transport, 1);

        let mut ctx = Context::new(header_at(11), &mut stores, &mut transport);
        let before = keeper.coin_rates_state(&ctx).unwrap();

        let stale = Packet { sequence: 7, ..request.clone() };
        keeper.on_acknowledgement_packet(&mut ctx, &stale, &request_id_ack(5)).unwrap();
        keeper.on_timeout_packet(&mut ctx, &stale).unwrap();
        // Result for a request id that was never acknowledged
        let ack = keeper.on_recv_packet(&mut ctx, &response_packet(2, 5, ResolveStatus::Success, &[1]));
        assert!(ack.is_success());
        assert_eq!(keeper.coin_rates_state(&ctx).unwrap(), before);

        keeper.on_timeout_packet(&mut ctx, &request).unwrap();
        assert_eq!(keeper.coin_rates_state(&ctx).unwrap().status(), RequestStatus::Failed);
        assert_eq!(ctx.events().last().unwrap().attribute(ATTRIBUTE_ERROR), Some("packet timed out"));
    }

    #[test]
    fn test_recv_rejects_unknown_client_and_channel() {
        let keeper = BandchainKeeper::default();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::with_channel(PORT_ID, CHANNEL);
        let mut ctx = Context::new(header_at(10), &mut stores, &mut transport);
        setup(&mut ctx, &["BTC"]);

        let mut packet = response_packet(1, 1, ResolveStatus::Success, &[1]);
        let mut data = OracleResponsePacketData::from_bytes(&packet.data).unwrap();
        data.client_id = "price_id".to_string();
        packet.data = data.to_bytes().unwrap();
        assert!(matches!(keeper.on_recv_packet(&mut ctx, &packet), Acknowledgement::Error(msg) if msg.contains("price_id")));

        let mut packet = response_packet(1, 1, ResolveStatus::Success, &[1]);
        packet.destination_channel = "channel-5".to_string();
        assert!(!keeper.on_recv_packet(&mut ctx, &packet).is_success());
    }

    #[test]
    fn test_price_list_expiry() {
        let keeper = BandchainKeeper::default();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::default();

        let mut ctx = Context::new(header_at(0), &mut stores, &mut transport);
        setup(&mut ctx, &["BTC"]);
        let mut list = SymbolPriceList::new(header_at(0).time);
        list.prices.insert("BTC".to_string(), dec!(50000));
        ctx.store_mut().set(SYMBOL_PRICE_LIST_KEY, &list).unwrap();
        drop(ctx);

        // 6 minutes at 5 seconds per block
        let ctx = Context::new(header_at(72), &mut stores, &mut transport);
        assert!(keeper.get_symbol_price_list(&ctx).is_ok());
        drop(ctx);
        let ctx = Context::new(header_at(73), &mut stores, &mut transport);
        assert!(matches!(keeper.get_symbol_price_list(&ctx), Err(CoreError::PriceListExpired { .. })));
    }

    #[test]
    fn test_epoch_hook_filters_identifier() {
        let keeper = BandchainKeeper::default();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::with_channel(PORT_ID, CHANNEL);
        let mut ctx = Context::new(header_at(1), &mut stores, &mut transport);
        setup(&mut ctx, &["BTC"]);

        keeper.after_epoch_end(&mut ctx, "day");
        assert_eq!(keeper.coin_rates_state(&ctx).unwrap().status(), RequestStatus::Empty);
        keeper.after_epoch_end(&mut ctx, "minute");
        assert_eq!(keeper.coin_rates_state(&ctx).unwrap().status(), RequestStatus::Pending);
    }
}
