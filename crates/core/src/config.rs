//! Configuration types and loading

use anyhow::{Context as _, Result};
use ::config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::packets::PacketTimeout;
use crate::{BlockHeader, CoreError, CoreResult, Height};

pub const DEFAULT_PACKET_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Channel and timeouts used to reach a remote source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IbcParams {
    pub authorized_channel: String,
    /// Relative to the current remote height; zero disables the height timeout
    pub timeout_height: Height,
    /// Nanoseconds relative to the current block time; zero disables the time timeout
    pub timeout_timestamp: u64,
}

impl Default for IbcParams {
    fn default() -> Self {
        Self {
            authorized_channel: String::new(),
            timeout_height: Height::default(),
            timeout_timestamp: DEFAULT_PACKET_TIMEOUT.as_nanos() as u64,
        }
    }
}

impl IbcParams {
    pub fn validate(&self) -> CoreResult<()> {
        if !self.authorized_channel.is_empty() {
            validate_channel_id(&self.authorized_channel)?;
        }
        if self.timeout_height.is_zero() && self.timeout_timestamp == 0 {
            return Err(CoreError::InvalidParams(
                "packet timeout height and timestamp cannot both be 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute timeout for a packet sent in the block of `header`
    pub fn packet_timeout(&self, header: &BlockHeader) -> PacketTimeout {
        let timestamp = if self.timeout_timestamp == 0 {
            0
        } else {
            let now = u64::try_from(header.time.timestamp_nanos_opt().unwrap_or(0)).unwrap_or(0);
            now.saturating_add(self.timeout_timestamp)
        };
        PacketTimeout {
            height: self.timeout_height,
            timestamp,
        }
    }
}

/// Channel identifiers have the form `channel-{n}`
pub fn validate_channel_id(id: &str) -> CoreResult<()> {
    let valid = id
        .strip_prefix("channel-")
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false);
    if !valid {
        return Err(CoreError::InvalidParams(format!("invalid channel identifier {id}")));
    }
    Ok(())
}

/// Load a config from an optional file plus `{prefix}__`-prefixed environment variables.
///
/// Nested keys use `__` as separator, e.g. `QORACLE__BANDCHAIN__ENABLED=true`.
pub fn load_config<T: DeserializeOwned>(path: Option<&Path>, env_prefix: &str) -> Result<T> {
    dotenvy::dotenv().ok();

    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }
    let config = builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}
