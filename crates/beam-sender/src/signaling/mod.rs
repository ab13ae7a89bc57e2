//! WebSocket link to the relay's sender endpoint.
//!
//! A background task owns the socket and the orchestrator. It connects
//! with a timeout, turns relay frames into orchestrator calls, sends the
//! resulting offers and candidates back, and after any drop disposes all
//! media and retries on a fixed delay until stopped.

mod client;
mod connection;
mod handler;
mod types;

pub use client::SignalingClient;
pub use types::{ChannelState, SignalingEvent};
