//! Test helpers: a recording transport and block headers

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeSet;

use crate::packets::{IbcTransport, OutgoingPacket};
use crate::{BlockHeader, CoreError, CoreResult};

/// Transport that records every packet and hands out increasing sequences
#[derive(Debug, Default)]
pub struct MockTransport {
    pub channels: BTreeSet<(String, String)>,
    pub sent: Vec<OutgoingPacket>,
    pub next_sequence: u64,
    /// When set, every send fails with this message
    pub fail_with: Option<String>,
}

impl MockTransport {
    pub fn with_channel(port: &str, channel: &str) -> Self {
        let mut transport = Self::default();
        transport.open_channel(port, channel);
        transport
    }

    pub fn open_channel(&mut self, port: &str, channel: &str) {
        self.channels.insert((port.to_string(), channel.to_string()));
    }

    pub fn last_sent(&self) -> Option<&OutgoingPacket> {
        self.sent.last()
    }
}

impl IbcTransport for MockTransport {
    fn has_channel_capability(&self, port: &str, channel: &str) -> bool {
        self.channels.contains(&(port.to_string(), channel.to_string()))
    }

    fn send_packet(&mut self, packet: OutgoingPacket) -> CoreResult<u64> {
        if let Some(msg) = &self.fail_with {
            return Err(CoreError::SendFailed(msg.clone()));
        }
        self.next_sequence += 1;
        self.sent.push(packet);
        Ok(self.next_sequence)
    }
}

/// Fixed genesis time used by tests
pub fn genesis_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Block header at `height`, five seconds per block after genesis
pub fn header_at(height: i64) -> BlockHeader {
    BlockHeader::new(height, genesis_time() + chrono::Duration::seconds(height * 5))
}
