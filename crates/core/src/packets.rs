//! Packet transport contract
//!
//! Delivery, ordering and exactly-once processing are provided by the host.
//! This module only describes the packets and acknowledgements exchanged with it.

use serde::{Deserialize, Serialize};

use crate::codec::base64_bytes;
use crate::{CoreError, CoreResult, Height};

/// A packet as delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub sequence: u64,
    pub source_port: String,
    pub source_channel: String,
    pub destination_port: String,
    pub destination_channel: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub timeout_height: Height,
    pub timeout_timestamp: u64,
}

/// Timeout of an outgoing packet, relative to the current block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketTimeout {
    pub height: Height,
    /// Nanoseconds
    pub timestamp: u64,
}

/// Packet handed to the transport for sending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingPacket {
    pub source_port: String,
    pub source_channel: String,
    pub data: Vec<u8>,
    pub timeout: PacketTimeout,
}

/// Outer acknowledgement envelope: either a result payload or an error string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Acknowledgement {
    Result(#[serde(with = "base64_bytes")] Vec<u8>),
    Error(String),
}

impl Acknowledgement {
    pub fn success(result: Vec<u8>) -> Self {
        Acknowledgement::Result(result)
    }

    pub fn error(err: impl ToString) -> Self {
        Acknowledgement::Error(err.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Acknowledgement::Result(_))
    }

    pub fn decode(bz: &[u8]) -> CoreResult<Self> {
        serde_json::from_slice(bz).map_err(|e| CoreError::InvalidAcknowledgement(e.to_string()))
    }

    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Host-provided packet transport and channel capability authorization
pub trait IbcTransport {
    /// Whether this module owns the capability of the given channel
    fn has_channel_capability(&self, port: &str, channel: &str) -> bool;

    /// Send a packet and return its sequence number
    fn send_packet(&mut self, packet: OutgoingPacket) -> CoreResult<u64>;
}

/// Check capability ownership, then send
pub fn send_authorized(transport: &mut dyn IbcTransport, packet: OutgoingPacket) -> CoreResult<u64> {
    if !transport.has_channel_capability(&packet.source_port, &packet.source_channel) {
        return Err(CoreError::ChannelCapabilityNotFound {
            port: packet.source_port,
            channel: packet.source_channel,
        });
    }
    transport.send_packet(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledgement_envelope() {
        let ack = Acknowledgement::success(b"{\"request_id\":\"7\"}".to_vec());
        let bz = ack.encode().unwrap();
        assert!(String::from_utf8(bz.clone()).unwrap().starts_with("{\"result\":\""));
        assert_eq!(Acknowledgement::decode(&bz).unwrap(), ack);

        let err = Acknowledgement::decode(br#"{"error":"oracle script failed"}"#).unwrap();
        assert!(!err.is_success());
        assert!(Acknowledgement::decode(b"garbage").is_err());
    }
}
