//! Seams to the embedder's capture and peer-connection stack.
//!
//! The sender crate never touches codecs or sockets for media. It only
//! drives these traits: one [`MediaPipeline`] for the shared capture, one
//! [`MediaSession`] per receiver.

use async_trait::async_trait;
use beam_common::{IceCandidate, ReceiverKey, SessionDescription};
use tokio::sync::mpsc;

use crate::error::MediaError;

/// A candidate gathered by a local session, tagged with the session
/// generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCandidate {
    pub key: ReceiverKey,
    pub generation: u64,
    pub candidate: IceCandidate,
}

/// Something the media stack reported on its own, outside any call the
/// orchestrator made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    Candidate(LocalCandidate),
    /// Capture ended without a release, e.g. the user revoked it from the
    /// system UI. `epoch` identifies the prepare call it belongs to.
    CaptureStopped { epoch: u64, reason: String },
}

/// Where a session pushes the candidates it gathers. Cheap to clone; the
/// embedder may call [`emit`](Self::emit) from any thread.
#[derive(Debug, Clone)]
pub struct CandidateSink {
    key: ReceiverKey,
    generation: u64,
    tx: mpsc::UnboundedSender<MediaEvent>,
}

impl CandidateSink {
    pub(crate) fn new(
        key: ReceiverKey,
        generation: u64,
        tx: mpsc::UnboundedSender<MediaEvent>,
    ) -> Self {
        Self { key, generation, tx }
    }

    pub fn key(&self) -> &ReceiverKey {
        &self.key
    }

    /// Hand a candidate to the signaling task. Returns false once the
    /// task is gone.
    pub fn emit(&self, candidate: IceCandidate) -> bool {
        self.tx
            .send(MediaEvent::Candidate(LocalCandidate {
                key: self.key.clone(),
                generation: self.generation,
                candidate,
            }))
            .is_ok()
    }
}

/// Handed to the pipeline on every prepare. The embedder keeps it for as
/// long as capture runs and reports through it when capture ends on its
/// own.
#[derive(Debug, Clone)]
pub struct CaptureMonitor {
    epoch: u64,
    tx: mpsc::UnboundedSender<MediaEvent>,
}

impl CaptureMonitor {
    pub(crate) fn new(epoch: u64, tx: mpsc::UnboundedSender<MediaEvent>) -> Self {
        Self { epoch, tx }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Report that capture stopped. Every session is torn down and the
    /// pipeline released; capture is prepared again only after a fresh
    /// authorization. Reports from an earlier prepare are ignored.
    pub fn capture_stopped(&self, reason: impl Into<String>) -> bool {
        self.tx
            .send(MediaEvent::CaptureStopped {
                epoch: self.epoch,
                reason: reason.into(),
            })
            .is_ok()
    }
}

/// One peer connection towards one receiver.
#[async_trait]
pub trait MediaSession: Send {
    async fn create_offer(&mut self) -> Result<SessionDescription, MediaError>;

    async fn set_remote_answer(&mut self, answer: SessionDescription) -> Result<(), MediaError>;

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), MediaError>;

    /// Tear the connection down. Must not fail; called exactly once.
    fn dispose(&mut self);
}

/// Shared capture feeding every session.
#[async_trait]
pub trait MediaPipeline: Send {
    /// Whatever the platform hands over when the user allows capture.
    type Authorization: Clone + Send + Sync + 'static;
    type Session: MediaSession + 'static;

    /// Start capture. Keep `monitor` to report capture ending outside a
    /// [`release`](Self::release).
    async fn prepare(
        &mut self,
        authorization: &Self::Authorization,
        monitor: CaptureMonitor,
    ) -> Result<(), MediaError>;

    fn release(&mut self);

    async fn open_session(
        &mut self,
        key: &ReceiverKey,
        candidates: CandidateSink,
    ) -> Result<Self::Session, MediaError>;
}
