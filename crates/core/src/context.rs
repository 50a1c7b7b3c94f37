//! Per-cycle execution context
//!
//! A `Context` lives for one block (or one packet callback). It borrows the stores and
//! the transport, carries the block header, collects events and owns the dirty flags
//! consumed by the cache rebuild at end block.

use chrono::{DateTime, Utc};

use crate::packets::IbcTransport;
use crate::store::{KvStore, MultiStore};
use crate::BlockHeader;

/// Which derived caches need a rebuild in this cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateFlags {
    pub price_dirty: bool,
    pub pool_dirty: bool,
}

impl UpdateFlags {
    pub fn any(&self) -> bool {
        self.price_dirty || self.pool_dirty
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Observability event with ordered key/value attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.attributes.push((key.into(), value.to_string()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub struct Context<'a> {
    header: BlockHeader,
    stores: &'a mut MultiStore,
    transport: &'a mut dyn IbcTransport,
    events: Vec<Event>,
    pub flags: UpdateFlags,
}

impl<'a> Context<'a> {
    pub fn new(header: BlockHeader, stores: &'a mut MultiStore, transport: &'a mut dyn IbcTransport) -> Self {
        Self {
            header,
            stores,
            transport,
            events: Vec::new(),
            flags: UpdateFlags::default(),
        }
    }

    pub fn header(&self) -> BlockHeader {
        self.header
    }

    pub fn block_height(&self) -> i64 {
        self.header.height
    }

    pub fn block_time(&self) -> DateTime<Utc> {
        self.header.time
    }

    pub fn stores(&self) -> &MultiStore {
        self.stores
    }

    pub fn stores_mut(&mut self) -> &mut MultiStore {
        self.stores
    }

    /// Persistent store
    pub fn store(&self) -> &KvStore {
        self.stores.persistent()
    }

    pub fn store_mut(&mut self) -> &mut KvStore {
        self.stores.persistent_mut()
    }

    /// Memory store
    pub fn mem_store(&self) -> &KvStore {
        self.stores.memory()
    }

    pub fn mem_store_mut(&mut self) -> &mut KvStore {
        self.stores.memory_mut()
    }

    pub fn transport(&self) -> &dyn IbcTransport {
        &*self.transport
    }

    pub fn transport_mut(&mut self) -> &mut dyn IbcTransport {
        &mut *self.transport
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// End the cycle, returning what was emitted
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_attributes_keep_order() {
        let event = Event::new("band_coin_rates_request")
            .attr("packet_sequence", 3)
            .attr("channel", "channel-1");
        assert_eq!(event.attribute("packet_sequence"), Some("3"));
        assert_eq!(event.attributes[1].0, "channel");
        assert_eq!(event.attribute("error"), None);
    }

    #[test]
    fn test_flags_clear() {
        let mut flags = UpdateFlags {
            price_dirty: true,
            pool_dirty: false,
        };
        assert!(flags.any());
        flags.clear();
        assert_eq!(flags, UpdateFlags::default());
    }
}
