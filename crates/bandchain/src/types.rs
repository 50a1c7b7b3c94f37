//! Bandchain oracle types: params, packet payloads, call data and results

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use qoracle_core::codec::{base64_bytes, i64_string, u64_string};
use qoracle_core::{Coin, CoreError, CoreResult, IbcParams, RequestState, RequestTracker};

use crate::obi::{ObiDecode, ObiEncode, ObiError, ObiReader, ObiWriter};

pub const SUBMODULE_NAME: &str = "bandchain";
pub const PORT_ID: &str = "qoraclebandchain";
pub const VERSION: &str = "bandchain-1";

pub const COIN_RATES_CLIENT_ID: &str = "coin_rates_id";

pub const COIN_RATES_STATE_KEY: &[u8] = b"bandchain/coin_rates_state";
pub const PARAMS_KEY: &[u8] = b"bandchain/params";
pub const SYMBOL_PRICE_LIST_KEY: &[u8] = b"bandchain/symbol_price_list";

pub const COIN_RATES: RequestTracker = RequestTracker::new(COIN_RATES_STATE_KEY, "band_coin_rates");

pub const EVENT_TYPE_ORACLE_ACKNOWLEDGEMENT: &str = "band_oracle_acknowledgement";
pub const EVENT_TYPE_ORACLE_RESPONSE: &str = "band_oracle_response";
pub const ATTRIBUTE_REQUEST_ID: &str = "request_id";
pub const ATTRIBUTE_RESOLVE_STATUS: &str = "resolve_status";

/// Default lifetime of a symbol price list: six minutes, in nanoseconds
pub const DEFAULT_PRICE_LIST_EXP_DURATION: u64 = 6 * 60 * 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleScriptParams {
    pub script_id: u64,
    pub ask_count: u64,
    pub min_count: u64,
    pub fee_limit: Vec<Coin>,
    pub prepare_gas: u64,
    pub execute_gas: u64,
}

impl Default for OracleScriptParams {
    fn default() -> Self {
        Self {
            script_id: 37,
            ask_count: 4,
            min_count: 3,
            fee_limit: vec![Coin::new("uband", 30)],
            prepare_gas: 600_000,
            execute_gas: 600_000,
        }
    }
}

impl OracleScriptParams {
    pub fn validate(&self) -> CoreResult<()> {
        if self.script_id == 0 {
            return Err(CoreError::InvalidParams("script id cannot be 0".to_string()));
        }
        if self.ask_count == 0 {
            return Err(CoreError::InvalidParams("ask count cannot be 0".to_string()));
        }
        if self.min_count == 0 || self.min_count > self.ask_count {
            return Err(CoreError::InvalidParams(format!(
                "min count must be in 1..={}, got {}",
                self.ask_count, self.min_count
            )));
        }
        if self.fee_limit.iter().all(|c| c.amount.is_zero()) {
            return Err(CoreError::InvalidParams("fee limit cannot be zero".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinRatesParams {
    /// Epoch whose end triggers a new coin rates request
    pub epoch_identifier: String,
    pub symbols: Vec<String>,
    /// Rates are reported as integers scaled by this factor
    pub multiplier: u64,
    pub script_params: OracleScriptParams,
}

impl Default for CoinRatesParams {
    fn default() -> Self {
        Self {
            epoch_identifier: "minute".to_string(),
            symbols: ["BTC", "OSMO", "BNB", "ATOM"].iter().map(|s| s.to_string()).collect(),
            multiplier: 1_000_000,
            script_params: OracleScriptParams::default(),
        }
    }
}

impl CoinRatesParams {
    pub fn validate(&self) -> CoreResult<()> {
        if self.epoch_identifier.trim().is_empty() {
            return Err(CoreError::InvalidParams("epoch identifier cannot be empty".to_string()));
        }
        if self.symbols.is_empty() {
            return Err(CoreError::InvalidParams("coin rates symbols cannot be empty".to_string()));
        }
        if let Some(symbol) = self.symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(CoreError::InvalidParams(format!("invalid symbol {symbol:?}")));
        }
        if self.multiplier == 0 {
            return Err(CoreError::InvalidParams("coin rates multiplier cannot be 0".to_string()));
        }
        self.script_params.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    pub enabled: bool,
    pub ibc: IbcParams,
    /// Nanoseconds a symbol price list stays valid after its update
    pub price_list_exp_duration: u64,
    pub coin_rates: CoinRatesParams,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            enabled: true,
            ibc: IbcParams::default(),
            price_list_exp_duration: DEFAULT_PRICE_LIST_EXP_DURATION,
            coin_rates: CoinRatesParams::default(),
        }
    }
}

impl Params {
    pub fn validate(&self) -> CoreResult<()> {
        self.ibc.validate()?;
        if self.price_list_exp_duration == 0 {
            return Err(CoreError::InvalidParams("price list expiry cannot be 0".to_string()));
        }
        self.coin_rates.validate()
    }
}

/// Input of the coin rates oracle script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRatesCallData {
    pub symbols: Vec<String>,
    pub multiplier: u64,
}

impl ObiEncode for CoinRatesCallData {
    fn encode_into(&self, writer: &mut ObiWriter) -> Result<(), ObiError> {
        writer.write_vec(&self.symbols)?;
        writer.write_u64(self.multiplier);
        Ok(())
    }
}

impl ObiDecode for CoinRatesCallData {
    fn decode_from(reader: &mut ObiReader<'_>) -> Result<Self, ObiError> {
        Ok(Self {
            symbols: reader.read_vec()?,
            multiplier: reader.read_u64()?,
        })
    }
}

/// Output of the coin rates oracle script, positionally aligned with the requested symbols
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinRatesResult {
    pub rates: Vec<u64>,
}

impl ObiEncode for CoinRatesResult {
    fn encode_into(&self, writer: &mut ObiWriter) -> Result<(), ObiError> {
        writer.write_vec(&self.rates)
    }
}

impl ObiDecode for CoinRatesResult {
    fn decode_from(reader: &mut ObiReader<'_>) -> Result<Self, ObiError> {
        Ok(Self {
            rates: reader.read_vec()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OracleCallData {
    CoinRates(CoinRatesCallData),
}

impl Default for OracleCallData {
    fn default() -> Self {
        OracleCallData::CoinRates(CoinRatesCallData::default())
    }
}

impl OracleCallData {
    pub fn obi_encode(&self) -> CoreResult<Vec<u8>> {
        match self {
            OracleCallData::CoinRates(call_data) => Ok(call_data.obi_encode()?),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OracleResult {
    CoinRates(CoinRatesResult),
}

pub type ResultDecoder = fn(&[u8]) -> CoreResult<OracleResult>;

fn decode_coin_rates(bz: &[u8]) -> CoreResult<OracleResult> {
    Ok(OracleResult::CoinRates(CoinRatesResult::obi_decode(bz)?))
}

/// Result decoders by client id
pub static RESULT_DECODERS: &[(&str, ResultDecoder)] = &[(COIN_RATES_CLIENT_ID, decode_coin_rates)];

pub fn decode_result(client_id: &str, bz: &[u8]) -> CoreResult<OracleResult> {
    let decoder = RESULT_DECODERS
        .iter()
        .find(|(id, _)| *id == client_id)
        .map(|(_, decoder)| decoder)
        .ok_or_else(|| CoreError::UnknownSource(client_id.to_string()))?;
    decoder(bz)
}

pub type OracleScriptState = RequestState<OracleCallData, OracleResult>;

/// Packet sent to request an oracle script execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequestPacketData {
    pub client_id: String,
    #[serde(with = "u64_string")]
    pub oracle_script_id: u64,
    #[serde(with = "base64_bytes")]
    pub calldata: Vec<u8>,
    #[serde(with = "u64_string")]
    pub ask_count: u64,
    #[serde(with = "u64_string")]
    pub min_count: u64,
    pub fee_limit: Vec<Coin>,
    #[serde(with = "u64_string")]
    pub prepare_gas: u64,
    #[serde(with = "u64_string")]
    pub execute_gas: u64,
}

impl OracleRequestPacketData {
    pub fn new(client_id: &str, params: &OracleScriptParams, calldata: Vec<u8>) -> Self {
        Self {
            client_id: client_id.to_string(),
            oracle_script_id: params.script_id,
            calldata,
            ask_count: params.ask_count,
            min_count: params.min_count,
            fee_limit: params.fee_limit.clone(),
            prepare_gas: params.prepare_gas,
            execute_gas: params.execute_gas,
        }
    }

    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bz: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(bz).map_err(|e| CoreError::InvalidPacket(format!("oracle request packet: {e}")))
    }
}

/// Acknowledgement payload of a request packet: the id assigned by the oracle chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequestPacketAcknowledgement {
    #[serde(with = "u64_string")]
    pub request_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveStatus {
    #[serde(rename = "RESOLVE_STATUS_OPEN_UNSPECIFIED")]
    Open,
    #[serde(rename = "RESOLVE_STATUS_SUCCESS")]
    Success,
    #[serde(rename = "RESOLVE_STATUS_FAILURE")]
    Failure,
    #[serde(rename = "RESOLVE_STATUS_EXPIRED")]
    Expired,
}

impl std::fmt::Display for ResolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolveStatus::Open => "RESOLVE_STATUS_OPEN_UNSPECIFIED",
            ResolveStatus::Success => "RESOLVE_STATUS_SUCCESS",
            ResolveStatus::Failure => "RESOLVE_STATUS_FAILURE",
            ResolveStatus::Expired => "RESOLVE_STATUS_EXPIRED",
        };
        f.write_str(s)
    }
}

/// Packet carrying the final result of an oracle request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResponsePacketData {
    pub client_id: String,
    #[serde(with = "u64_string")]
    pub request_id: u64,
    #[serde(with = "u64_string")]
    pub ans_count: u64,
    #[serde(with = "i64_string")]
    pub request_time: i64,
    #[serde(with = "i64_string")]
    pub resolve_time: i64,
    pub resolve_status: ResolveStatus,
    #[serde(with = "base64_bytes", default)]
    pub result: Vec<u8>,
}

impl OracleResponsePacketData {
    pub fn from_bytes(bz: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(bz).map_err(|e| CoreError::InvalidPacket(format!("oracle response packet: {e}")))
    }

    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Short printable form of call data for logs and events
pub fn calldata_digest(bz: &[u8]) -> String {
    STANDARD.encode(bz)
}
