//! Session lifecycle: open on receiver-online, dispose on receiver-offline,
//! and keep the capture pipeline prepared exactly while sessions exist.

use std::collections::{BTreeSet, HashMap};

use beam_common::{IceCandidate, ReceiverKey, SessionDescription};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Result, SenderError};
use crate::media::{
    CandidateSink, CaptureMonitor, LocalCandidate, MediaEvent, MediaPipeline, MediaSession,
};

use super::types::{ActiveSession, NegotiationState, SignalOut};

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Keeps one [`MediaSession`] per online receiver.
///
/// The pipeline is prepared if and only if at least one session is
/// active. Any operation that would leave those two out of step returns
/// [`SenderError::Contract`].
pub struct PeerSessionOrchestrator<P: MediaPipeline> {
    pipeline: P,
    prepared: bool,
    authorization: Option<P::Authorization>,
    sessions: HashMap<ReceiverKey, ActiveSession<P::Session>>,
    /// Receivers that came online while capture was not authorized.
    waiting: BTreeSet<ReceiverKey>,
    next_generation: u64,
    /// Bumped on every prepare; tags the monitor handed to the pipeline.
    capture_epoch: u64,
    media_tx: mpsc::UnboundedSender<MediaEvent>,
}

impl<P: MediaPipeline> PeerSessionOrchestrator<P> {
    /// Returns the orchestrator and the stream of events its media stack
    /// reports. Feed candidates back through [`on_local_candidate`] and
    /// capture stops through [`on_capture_stopped`].
    ///
    /// [`on_local_candidate`]: Self::on_local_candidate
    /// [`on_capture_stopped`]: Self::on_capture_stopped
    pub fn new(pipeline: P) -> (Self, mpsc::UnboundedReceiver<MediaEvent>) {
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let orchestrator = Self {
            pipeline,
            prepared: false,
            authorization: None,
            sessions: HashMap::new(),
            waiting: BTreeSet::new(),
            next_generation: 1,
            capture_epoch: 0,
            media_tx,
        };
        (orchestrator, media_rx)
    }

    /// Store the capture authorization without offering to anyone.
    pub fn set_authorization(&mut self, authorization: P::Authorization) {
        self.authorization = Some(authorization);
    }

    /// Store the capture authorization and open sessions for every
    /// receiver that was turned away for lack of it.
    pub async fn authorize(&mut self, authorization: P::Authorization) -> Result<Vec<SignalOut>> {
        self.authorization = Some(authorization);

        let waiting = std::mem::take(&mut self.waiting);
        if !waiting.is_empty() {
            info!(count = waiting.len(), "Capture authorized, offering to waiting receivers");
        }

        let mut signals = Vec::with_capacity(waiting.len());
        for key in waiting {
            match self.on_receiver_online(key.clone()).await {
                Ok(signal) => signals.push(signal),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(key = %key, error = %e, "Failed to open session"),
            }
        }
        Ok(signals)
    }

    /// Prepare the pipeline unless it already is.
    pub async fn ensure_prepared(&mut self) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        let authorization = self
            .authorization
            .as_ref()
            .ok_or(SenderError::MissingAuthorization)?;
        self.capture_epoch += 1;
        let monitor = CaptureMonitor::new(self.capture_epoch, self.media_tx.clone());
        self.pipeline.prepare(authorization, monitor).await?;
        self.prepared = true;
        info!(epoch = self.capture_epoch, "Capture pipeline prepared");
        Ok(())
    }

    /// Open a fresh session for `key` and return its offer.
    ///
    /// A session already open for the key is disposed first. On
    /// [`SenderError::MissingAuthorization`] the key is remembered and
    /// offered to once [`authorize`](Self::authorize) is called.
    pub async fn on_receiver_online(&mut self, key: ReceiverKey) -> Result<SignalOut> {
        if let Some(mut prior) = self.sessions.remove(&key) {
            debug!(key = %key, "Replacing existing session");
            prior.session.dispose();
        }

        if let Err(e) = self.ensure_prepared().await {
            if matches!(e, SenderError::MissingAuthorization) {
                self.waiting.insert(key);
            }
            self.release_if_idle()?;
            return Err(e);
        }
        self.waiting.remove(&key);

        let generation = self.next_generation;
        self.next_generation += 1;
        let sink = CandidateSink::new(key.clone(), generation, self.media_tx.clone());

        let mut session = match self.open_session(&key, sink).await {
            Ok(session) => session,
            Err(e) => {
                self.release_if_idle()?;
                return Err(e);
            }
        };

        let description = match session.create_offer().await {
            Ok(description) => description,
            Err(e) => {
                session.dispose();
                self.release_if_idle()?;
                return Err(e.into());
            }
        };

        self.sessions.insert(
            key.clone(),
            ActiveSession {
                generation,
                state: NegotiationState::AwaitingAnswer,
                session,
            },
        );
        info!(key = %key, generation, active = self.sessions.len(), "Session opened");
        self.check_invariant()?;

        Ok(SignalOut::Offer { key, description })
    }

    /// Dispose the key's session and release the pipeline if it was the
    /// last one.
    pub async fn on_receiver_offline(&mut self, key: &ReceiverKey) -> Result<()> {
        self.waiting.remove(key);
        match self.sessions.remove(key) {
            Some(mut active) => {
                active.session.dispose();
                info!(key = %key, active = self.sessions.len(), "Session closed");
            }
            None => debug!(key = %key, "Offline for receiver without session"),
        }
        self.release_if_idle()?;
        self.check_invariant()
    }

    /// Apply a receiver's answer. Answers for unknown keys, or for a
    /// session that already has one, are dropped.
    pub async fn on_answer(&mut self, key: &ReceiverKey, answer: SessionDescription) -> Result<()> {
        let Some(active) = self.sessions.get_mut(key) else {
            debug!(key = %key, "Answer for unknown receiver dropped");
            return Ok(());
        };
        if active.state != NegotiationState::AwaitingAnswer {
            debug!(key = %key, "Duplicate answer dropped");
            return Ok(());
        }
        active.session.set_remote_answer(answer).await?;
        active.state = NegotiationState::Answered;
        debug!(key = %key, "Answer applied");
        Ok(())
    }

    pub async fn on_remote_candidate(
        &mut self,
        key: &ReceiverKey,
        candidate: IceCandidate,
    ) -> Result<()> {
        match self.sessions.get_mut(key) {
            Some(active) => Ok(active.session.add_remote_candidate(candidate).await?),
            None => {
                debug!(key = %key, "Candidate for unknown receiver dropped");
                Ok(())
            }
        }
    }

    /// Turn a gathered candidate into a signal, unless the session that
    /// gathered it has since been replaced or closed.
    pub fn on_local_candidate(&self, local: LocalCandidate) -> Option<SignalOut> {
        match self.sessions.get(&local.key) {
            Some(active) if active.generation == local.generation => Some(SignalOut::Candidate {
                key: local.key,
                candidate: local.candidate,
            }),
            _ => {
                debug!(
                    key = %local.key,
                    generation = local.generation,
                    "Stale local candidate dropped"
                );
                None
            }
        }
    }

    /// Capture ended outside our control. Dispose every session, release
    /// the pipeline, and drop the authorization so nothing is prepared
    /// again until [`authorize`](Self::authorize). The affected receivers
    /// are remembered and offered to once that happens.
    ///
    /// Returns false when the report belongs to an earlier prepare.
    pub fn on_capture_stopped(&mut self, epoch: u64, reason: &str) -> Result<bool> {
        if !self.prepared || epoch != self.capture_epoch {
            debug!(epoch, current = self.capture_epoch, "Stale capture stop ignored");
            return Ok(false);
        }
        warn!(epoch, reason, active = self.sessions.len(), "Capture stopped");

        let keys: Vec<ReceiverKey> = self.sessions.keys().cloned().collect();
        self.release_all()?;
        self.authorization = None;
        self.waiting.extend(keys);
        self.check_invariant()?;
        Ok(true)
    }

    /// Dispose every session, forget waiting receivers, and release the
    /// pipeline.
    pub fn release_all(&mut self) -> Result<()> {
        self.waiting.clear();
        let count = self.sessions.len();
        for (_, mut active) in self.sessions.drain() {
            active.session.dispose();
        }
        if self.prepared {
            self.release_pipeline()?;
        }
        if count > 0 {
            info!(count, "Released all sessions");
        }
        Ok(())
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, key: &ReceiverKey) -> bool {
        self.sessions.contains_key(key)
    }

    pub fn negotiation_state(&self, key: &ReceiverKey) -> Option<NegotiationState> {
        self.sessions.get(key).map(|active| active.state)
    }

    pub fn is_waiting(&self, key: &ReceiverKey) -> bool {
        self.waiting.contains(key)
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    // -- pipeline bookkeeping ----------------------------------------------

    async fn open_session(&mut self, key: &ReceiverKey, sink: CandidateSink) -> Result<P::Session> {
        if !self.prepared {
            return Err(SenderError::Contract("session opened on an unprepared pipeline"));
        }
        Ok(self.pipeline.open_session(key, sink).await?)
    }

    fn release_if_idle(&mut self) -> Result<()> {
        if self.prepared && self.sessions.is_empty() {
            self.release_pipeline()?;
        }
        Ok(())
    }

    fn release_pipeline(&mut self) -> Result<()> {
        if !self.prepared {
            return Err(SenderError::Contract("pipeline released twice"));
        }
        self.pipeline.release();
        self.prepared = false;
        info!("Capture pipeline released");
        Ok(())
    }

    fn check_invariant(&self) -> Result<()> {
        if self.prepared == self.sessions.is_empty() {
            return Err(SenderError::Contract(
                "pipeline preparation out of step with active sessions",
            ));
        }
        Ok(())
    }
}
