//! Sender-device side of a beam broadcast.
//!
//! [`PeerSessionOrchestrator`] keeps one media session per online receiver
//! on top of a shared capture pipeline; [`SignalingClient`] owns the
//! WebSocket to the relay, feeds the orchestrator, and reconnects after
//! transport failures. Capture, encoding and the peer connections
//! themselves are supplied by the embedder through [`MediaPipeline`].

pub mod codec;
pub mod config;
pub mod error;
pub mod media;
pub mod orchestrator;
pub mod signaling;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::{JsonCodec, PayloadCodec};
pub use config::SenderConfig;
pub use error::{MediaError, Result, SenderError};
pub use media::{
    CandidateSink, CaptureMonitor, LocalCandidate, MediaEvent, MediaPipeline, MediaSession,
};
pub use orchestrator::{NegotiationState, PeerSessionOrchestrator, SignalOut};
pub use signaling::{ChannelState, SignalingClient, SignalingEvent};
