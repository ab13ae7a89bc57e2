//! Per-receiver media sessions over one shared capture pipeline.
//!
//! The orchestrator is owned by the signaling task and driven through
//! `&mut self`, so operations for a key never interleave: an offer is
//! fully created before the next inbound frame is looked at.

mod manager;
mod types;

pub use manager::PeerSessionOrchestrator;
pub use types::{NegotiationState, SignalOut};

#[cfg(test)]
mod tests;
