//! Recording media doubles shared by the orchestrator and signaling tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use beam_common::{IceCandidate, ReceiverKey, SessionDescription};

use crate::error::MediaError;
use crate::media::{CandidateSink, CaptureMonitor, MediaPipeline, MediaSession};

/// Authorization the mock refuses to prepare with.
pub const DENIED: &str = "denied";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Prepare,
    Release,
    Open(String),
    CreateOffer(String),
    Answer(String, String),
    RemoteCandidate(String, String),
    Dispose(String),
}

#[derive(Default)]
pub struct Log {
    pub calls: Vec<Call>,
    sinks: HashMap<String, CandidateSink>,
    monitor: Option<CaptureMonitor>,
    fail_offer: Option<String>,
}

#[derive(Clone, Default)]
pub struct SharedLog(Arc<Mutex<Log>>);

impl SharedLog {
    fn record(&self, call: Call) {
        self.0.lock().unwrap().calls.push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    pub fn disposed(&self, key: &str) -> usize {
        self.count(&Call::Dispose(key.to_string()))
    }

    /// Sink handed to the most recent session for `key`.
    pub fn sink(&self, key: &str) -> CandidateSink {
        self.0.lock().unwrap().sinks[key].clone()
    }

    /// Monitor handed to the most recent prepare.
    pub fn monitor(&self) -> CaptureMonitor {
        self.0.lock().unwrap().monitor.clone().unwrap()
    }

    /// Make offer creation fail for sessions towards `key`.
    pub fn fail_offer_for(&self, key: &str) {
        self.0.lock().unwrap().fail_offer = Some(key.to_string());
    }
}

pub struct MockPipeline {
    pub log: SharedLog,
}

impl MockPipeline {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        (Self { log: log.clone() }, log)
    }
}

#[async_trait]
impl MediaPipeline for MockPipeline {
    type Authorization = String;
    type Session = MockSession;

    async fn prepare(
        &mut self,
        authorization: &String,
        monitor: CaptureMonitor,
    ) -> Result<(), MediaError> {
        if authorization == DENIED {
            return Err(MediaError::PermissionDenied("capture refused".into()));
        }
        self.log.record(Call::Prepare);
        self.log.0.lock().unwrap().monitor = Some(monitor);
        Ok(())
    }

    fn release(&mut self) {
        self.log.record(Call::Release);
    }

    async fn open_session(
        &mut self,
        key: &ReceiverKey,
        candidates: CandidateSink,
    ) -> Result<MockSession, MediaError> {
        self.log.record(Call::Open(key.to_string()));
        self.log
            .0
            .lock()
            .unwrap()
            .sinks
            .insert(key.to_string(), candidates);
        Ok(MockSession {
            key: key.to_string(),
            log: self.log.clone(),
        })
    }
}

pub struct MockSession {
    key: String,
    log: SharedLog,
}

#[async_trait]
impl MediaSession for MockSession {
    async fn create_offer(&mut self) -> Result<SessionDescription, MediaError> {
        self.log.record(Call::CreateOffer(self.key.clone()));
        if self.log.0.lock().unwrap().fail_offer.as_deref() == Some(self.key.as_str()) {
            return Err(MediaError::Negotiation("no codecs".into()));
        }
        Ok(SessionDescription::offer(format!("offer-for-{}", self.key)))
    }

    async fn set_remote_answer(&mut self, answer: SessionDescription) -> Result<(), MediaError> {
        self.log.record(Call::Answer(self.key.clone(), answer.sdp));
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), MediaError> {
        self.log
            .record(Call::RemoteCandidate(self.key.clone(), candidate.candidate));
        Ok(())
    }

    fn dispose(&mut self) {
        self.log.record(Call::Dispose(self.key.clone()));
    }
}

pub fn key(raw: &str) -> ReceiverKey {
    ReceiverKey::new(raw)
}

pub fn candidate(line: &str) -> IceCandidate {
    IceCandidate::from_sdp_line(line, 0, "0")
}
