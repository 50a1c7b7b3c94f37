//! Error types

use thiserror::Error;

/// Core error types shared by every qoracle module
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Price not found for denom: {0}")]
    PriceNotFound(String),

    #[error("Symbol price list not available: {0}")]
    PriceListUnavailable(String),

    #[error("Symbol price list expired: updated at {updated_at}, valid until {expires_at}")]
    PriceListExpired { updated_at: String, expires_at: String },

    #[error("Division by zero: {0}")]
    DivideByZero(String),

    #[error("Decimal overflow: {0}")]
    Overflow(String),

    #[error("Epoch not found: {0}")]
    EpochNotFound(String),

    #[error("Gauge weight not found for gauge id {0}")]
    GaugeWeightNotFound(u64),

    #[error("Unauthorized: expected {expected}, got {actual}")]
    Unauthorized { expected: String, actual: String },

    #[error("Invalid denom symbol mapping: {0}")]
    InvalidMapping(String),

    #[error("Module disabled: {0}")]
    Disabled(String),

    #[error("Unknown source identifier: {0}")]
    UnknownSource(String),

    #[error("Unauthorized packet on port {port} channel {channel}")]
    UnauthorizedPacket { port: String, channel: String },

    #[error("Module does not own channel capability for port {port} channel {channel}")]
    ChannelCapabilityNotFound { port: String, channel: String },

    #[error("Packet send failed: {0}")]
    SendFailed(String),

    #[error("Invalid packet data: {0}")]
    InvalidPacket(String),

    #[error("Invalid acknowledgement: {0}")]
    InvalidAcknowledgement(String),

    #[error("Oracle result decode failed: {0}")]
    ResultDecode(String),

    #[error("Interchain query response failed with code {code} on path {path}")]
    FailedQueryResponse { path: String, code: u32 },

    #[error("Remote data not received yet: {0}")]
    RemoteDataMissing(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal invariant violated: {0}")]
    InvariantViolated(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

/// Errors raised while assembling the oracle registry and stores at startup
#[derive(Debug, Error)]
pub enum WiringError {
    #[error("Exactly one price oracle must be registered, found {0}")]
    PriceOracleCount(usize),

    #[error("Pool oracle with source {0} registered twice")]
    DuplicatePoolOracle(String),

    #[error("Invalid pool source name {0:?}: must be non-empty and contain no '/'")]
    InvalidSourceName(String),

    #[error("Invalid memory store kind: got {got}, expected {expected}")]
    InvalidStoreKind { got: String, expected: String },
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
pub type WiringResult<T> = Result<T, WiringError>;
