//! Per-source request lifecycle
//!
//! Each remote source owns one `RequestState` slot in the persistent store. At most one
//! request per slot is in flight: a new request is only sent once the previous one
//! resolved or failed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{Context, Event};
use crate::packets::{send_authorized, OutgoingPacket};
use crate::CoreResult;

pub const EVENT_TYPE_REQUEST: &str = "oracle_request";
pub const ATTRIBUTE_KIND: &str = "kind";
pub const ATTRIBUTE_CLIENT_ID: &str = "client_id";
pub const ATTRIBUTE_PACKET_SEQUENCE: &str = "packet_sequence";
pub const ATTRIBUTE_CHANNEL: &str = "channel";
pub const ATTRIBUTE_ERROR: &str = "error";

/// Lifecycle of a request slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Nothing was ever sent
    Empty,
    Pending,
    Resolved,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestState<C, R> {
    pub client_id: String,
    /// Remote-assigned id, known once the request packet was acknowledged
    pub request_id: Option<u64>,
    pub request_sequence: u64,
    /// Sequence of the inbound packet that carried the result
    pub result_sequence: u64,
    pub started_at_height: i64,
    pub updated_at_height: i64,
    pub call_data: C,
    pub result: Option<R>,
    pub failed: bool,
}

impl<C: Default, R> Default for RequestState<C, R> {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            request_id: None,
            request_sequence: 0,
            result_sequence: 0,
            started_at_height: 0,
            updated_at_height: 0,
            call_data: C::default(),
            result: None,
            failed: false,
        }
    }
}

impl<C, R> RequestState<C, R> {
    pub fn new(client_id: impl Into<String>, call_data: C, sequence: u64, height: i64) -> Self {
        Self {
            client_id: client_id.into(),
            request_id: None,
            request_sequence: sequence,
            result_sequence: 0,
            started_at_height: height,
            updated_at_height: height,
            call_data,
            result: None,
            failed: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.request_sequence > 0 && self.result.is_none() && !self.failed
    }

    pub fn status(&self) -> RequestStatus {
        if self.request_sequence == 0 {
            RequestStatus::Empty
        } else if self.failed {
            RequestStatus::Failed
        } else if self.result.is_some() {
            RequestStatus::Resolved
        } else {
            RequestStatus::Pending
        }
    }

    pub fn fail(&mut self) {
        self.failed = true;
    }

    pub fn resolve(&mut self, result: R, result_sequence: u64) {
        self.result = Some(result);
        self.result_sequence = result_sequence;
    }
}

/// What an adapter hands back when asked to build a request
#[derive(Debug, Clone)]
pub struct PreparedRequest<C> {
    pub client_id: String,
    pub call_data: C,
    pub packet: OutgoingPacket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryUpdateOutcome {
    Disabled,
    AlreadyPending,
    /// Nothing to ask for; the caller cleared its cached data instead
    Skipped,
    Sent(u64),
}

/// Store slot and lifecycle rules of one remote source
#[derive(Debug, Clone, Copy)]
pub struct RequestTracker {
    key: &'static [u8],
    kind: &'static str,
}

impl RequestTracker {
    pub const fn new(key: &'static [u8], kind: &'static str) -> Self {
        Self { key, kind }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Current state, or the empty state when nothing was ever sent
    pub fn load<C, R>(&self, ctx: &Context) -> CoreResult<RequestState<C, R>>
    where
        C: DeserializeOwned + Default,
        R: DeserializeOwned,
    {
        Ok(ctx.store().get(self.key)?.unwrap_or_default())
    }

    pub fn save<C, R>(&self, ctx: &mut Context, state: &RequestState<C, R>) -> CoreResult<()>
    where
        C: Serialize,
        R: Serialize,
    {
        ctx.store_mut().set(self.key, state)
    }

    /// Load, mutate, stamp `updated_at_height` and persist
    pub fn update<C, R, F>(&self, ctx: &mut Context, f: F) -> CoreResult<RequestState<C, R>>
    where
        C: Serialize + DeserializeOwned + Default,
        R: Serialize + DeserializeOwned,
        F: FnOnce(&mut RequestState<C, R>),
    {
        let mut state = self.load(ctx)?;
        f(&mut state);
        state.updated_at_height = ctx.block_height();
        self.save(ctx, &state)?;
        Ok(state)
    }

    /// Send a new request unless disabled or one is still in flight.
    ///
    /// On error nothing is written and the previous state stays as it was.
    pub fn try_update<C, R, F>(&self, ctx: &mut Context, enabled: bool, build: F) -> CoreResult<TryUpdateOutcome>
    where
        C: Serialize + DeserializeOwned + Default,
        R: Serialize + DeserializeOwned,
        F: FnOnce(&mut Context) -> CoreResult<PreparedRequest<C>>,
    {
        if !enabled {
            debug!(kind = self.kind, "Source disabled, skipping request");
            return Ok(TryUpdateOutcome::Disabled);
        }

        let state: RequestState<C, R> = self.load(ctx)?;
        if state.is_pending() {
            info!(
                kind = self.kind,
                state_seq = state.request_sequence,
                started_at = state.started_at_height,
                "Tried to send a request while the previous one is still pending"
            );
            return Ok(TryUpdateOutcome::AlreadyPending);
        }

        let prepared = match build(ctx) {
            Ok(prepared) => prepared,
            Err(e) => {
                self.emit_failure(ctx, None, &e);
                return Err(e);
            }
        };
        let channel = prepared.packet.source_channel.clone();

        let sequence = match send_authorized(ctx.transport_mut(), prepared.packet) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(kind = self.kind, channel = %channel, error = %e, "Failed to send request packet");
                self.emit_failure(ctx, Some(&channel), &e);
                return Err(e);
            }
        };

        let state: RequestState<C, R> = RequestState::new(prepared.client_id, prepared.call_data, sequence, ctx.block_height());
        self.save(ctx, &state)?;

        ctx.emit(
            Event::new(EVENT_TYPE_REQUEST)
                .attr(ATTRIBUTE_KIND, self.kind)
                .attr(ATTRIBUTE_CLIENT_ID, &state.client_id)
                .attr(ATTRIBUTE_PACKET_SEQUENCE, sequence)
                .attr(ATTRIBUTE_CHANNEL, &channel),
        );
        info!(kind = self.kind, packet_seq = sequence, channel = %channel, "Request packet sent");

        Ok(TryUpdateOutcome::Sent(sequence))
    }

    fn emit_failure(&self, ctx: &mut Context, channel: Option<&str>, err: &crate::CoreError) {
        let mut event = Event::new(EVENT_TYPE_REQUEST).attr(ATTRIBUTE_KIND, self.kind);
        if let Some(channel) = channel {
            event = event.attr(ATTRIBUTE_CHANNEL, channel);
        }
        ctx.emit(event.attr(ATTRIBUTE_ERROR, err));
    }
}
