//! Negotiation state and outbound signals.

use beam_common::{IceCandidate, ReceiverKey, SessionDescription};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where a receiver's session is in the offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// Offer sent, no answer applied yet.
    AwaitingAnswer,
    Answered,
}

/// Something the orchestrator wants sent to a receiver through the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOut {
    Offer {
        key: ReceiverKey,
        description: SessionDescription,
    },
    Candidate {
        key: ReceiverKey,
        candidate: IceCandidate,
    },
}

impl SignalOut {
    pub fn key(&self) -> &ReceiverKey {
        match self {
            Self::Offer { key, .. } | Self::Candidate { key, .. } => key,
        }
    }
}

/// A live session plus the bookkeeping the orchestrator keeps for it.
pub(super) struct ActiveSession<S> {
    pub(super) generation: u64,
    pub(super) state: NegotiationState,
    pub(super) session: S,
}
