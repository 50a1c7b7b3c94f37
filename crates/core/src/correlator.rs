//! Matching inbound packets to the tracked request
//!
//! Replies that do not belong to the request currently in flight (old sequence, already
//! terminal, different remote request id) are dropped with a log line and never touch
//! the state.

use std::fmt;
use tracing::warn;

use crate::tracker::RequestState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    Sequence { packet: u64, state: u64 },
    NotPending,
    RequestId { packet: u64, state: Option<u64> },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Sequence { packet, state } => {
                write!(f, "packet sequence {packet} does not match request sequence {state}")
            }
            Mismatch::NotPending => write!(f, "request is not pending"),
            Mismatch::RequestId { packet, state } => match state {
                Some(state) => write!(f, "request id {packet} does not match tracked id {state}"),
                None => write!(f, "request id {packet} received before the request was acknowledged"),
            },
        }
    }
}

/// Acknowledgements and timeouts: same outgoing sequence, state still pending
pub fn check_sequence<C, R>(state: &RequestState<C, R>, packet_sequence: u64) -> Result<(), Mismatch> {
    if packet_sequence != state.request_sequence {
        return Err(Mismatch::Sequence {
            packet: packet_sequence,
            state: state.request_sequence,
        });
    }
    if !state.is_pending() {
        return Err(Mismatch::NotPending);
    }
    Ok(())
}

/// Final results: same remote request id, state still pending
pub fn check_request_id<C, R>(state: &RequestState<C, R>, request_id: u64) -> Result<(), Mismatch> {
    if state.request_id != Some(request_id) {
        return Err(Mismatch::RequestId {
            packet: request_id,
            state: state.request_id,
        });
    }
    if !state.is_pending() {
        return Err(Mismatch::NotPending);
    }
    Ok(())
}

/// Log a discarded packet, returning `true` when the packet matched
pub fn accept(kind: &str, packet_sequence: u64, check: Result<(), Mismatch>) -> bool {
    match check {
        Ok(()) => true,
        Err(mismatch) => {
            warn!(kind, packet_seq = packet_sequence, reason = %mismatch, "Ignoring packet for a request that is not in flight");
            false
        }
    }
}
