//! Tests for session lifecycle and pipeline bookkeeping.

use super::*;
use crate::error::SenderError;
use crate::media::MediaEvent;
use crate::testing::{candidate, key, Call, MockPipeline, SharedLog, DENIED};
use beam_common::SessionDescription;

fn authorized() -> (
    PeerSessionOrchestrator<MockPipeline>,
    tokio::sync::mpsc::UnboundedReceiver<MediaEvent>,
    SharedLog,
) {
    let (pipeline, log) = MockPipeline::new();
    let (mut orchestrator, media) = PeerSessionOrchestrator::new(pipeline);
    orchestrator.set_authorization("granted".to_string());
    (orchestrator, media, log)
}

#[tokio::test]
async fn receiver_online_prepares_and_offers() {
    let (mut orch, _media, log) = authorized();

    let signal = orch.on_receiver_online(key("r1")).await.unwrap();
    assert_eq!(
        signal,
        SignalOut::Offer {
            key: key("r1"),
            description: SessionDescription::offer("offer-for-r1"),
        }
    );
    assert!(orch.is_prepared());
    assert_eq!(orch.negotiation_state(&key("r1")), Some(NegotiationState::AwaitingAnswer));
    assert_eq!(
        log.calls(),
        vec![
            Call::Prepare,
            Call::Open("r1".into()),
            Call::CreateOffer("r1".into())
        ]
    );
}

#[tokio::test]
async fn pipeline_prepared_only_while_sessions_exist() {
    let (mut orch, _media, log) = authorized();

    orch.on_receiver_online(key("a")).await.unwrap();
    orch.on_receiver_online(key("b")).await.unwrap();
    assert_eq!(orch.active_count(), 2);
    assert_eq!(log.count(&Call::Prepare), 1);

    orch.on_receiver_offline(&key("a")).await.unwrap();
    assert!(orch.is_prepared());
    assert_eq!(log.count(&Call::Release), 0);

    orch.on_receiver_offline(&key("b")).await.unwrap();
    assert!(!orch.is_prepared());
    assert_eq!(orch.active_count(), 0);
    assert_eq!(log.count(&Call::Release), 1);

    // Offline for an unknown key changes nothing.
    orch.on_receiver_offline(&key("b")).await.unwrap();
    assert_eq!(log.count(&Call::Release), 1);
}

#[tokio::test]
async fn missing_authorization_remembers_receiver() {
    let (pipeline, log) = MockPipeline::new();
    let (mut orch, _media) = PeerSessionOrchestrator::new(pipeline);

    let err = orch.on_receiver_online(key("r1")).await.unwrap_err();
    assert!(matches!(err, SenderError::MissingAuthorization));
    assert!(!err.is_fatal());
    assert!(orch.is_waiting(&key("r1")));
    assert!(!orch.is_prepared());
    assert!(log.calls().is_empty());

    let signals = orch.authorize("granted".to_string()).await.unwrap();
    assert_eq!(signals.len(), 1);
    assert_eq!(signals[0].key(), &key("r1"));
    assert!(!orch.is_waiting(&key("r1")));
    assert!(orch.has_session(&key("r1")));
}

#[tokio::test]
async fn waiting_receiver_that_leaves_is_forgotten() {
    let (pipeline, _log) = MockPipeline::new();
    let (mut orch, _media) = PeerSessionOrchestrator::new(pipeline);

    let _ = orch.on_receiver_online(key("r1")).await;
    orch.on_receiver_offline(&key("r1")).await.unwrap();

    let signals = orch.authorize("granted".to_string()).await.unwrap();
    assert!(signals.is_empty());
    assert!(!orch.is_prepared());
}

#[tokio::test]
async fn refused_capture_leaves_pipeline_released() {
    let (pipeline, _log) = MockPipeline::new();
    let (mut orch, _media) = PeerSessionOrchestrator::new(pipeline);
    orch.set_authorization(DENIED.to_string());

    let err = orch.on_receiver_online(key("r1")).await.unwrap_err();
    assert!(matches!(err, SenderError::Media(_)));
    assert!(!orch.is_prepared());
    assert!(!orch.is_waiting(&key("r1")));
}

#[tokio::test]
async fn late_answer_after_offline_is_dropped() {
    let (mut orch, _media, log) = authorized();

    orch.on_receiver_online(key("r1")).await.unwrap();
    orch.on_receiver_offline(&key("r1")).await.unwrap();
    assert_eq!(log.disposed("r1"), 1);

    orch.on_answer(&key("r1"), SessionDescription::answer("late"))
        .await
        .unwrap();
    orch.on_remote_candidate(&key("r1"), candidate("candidate:1 1 udp 1 10.0.0.1 9 typ host"))
        .await
        .unwrap();

    assert!(!log
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Answer(..) | Call::RemoteCandidate(..))));
}

#[tokio::test]
async fn duplicate_answer_is_dropped() {
    let (mut orch, _media, log) = authorized();
    orch.on_receiver_online(key("r1")).await.unwrap();

    orch.on_answer(&key("r1"), SessionDescription::answer("first"))
        .await
        .unwrap();
    orch.on_answer(&key("r1"), SessionDescription::answer("second"))
        .await
        .unwrap();

    assert_eq!(orch.negotiation_state(&key("r1")), Some(NegotiationState::Answered));
    assert_eq!(log.count(&Call::Answer("r1".into(), "first".into())), 1);
    assert_eq!(log.count(&Call::Answer("r1".into(), "second".into())), 0);
}

#[tokio::test]
async fn remote_media_reach_the_right_session() {
    let (mut orch, _media, log) = authorized();
    orch.on_receiver_online(key("a")).await.unwrap();
    orch.on_receiver_online(key("b")).await.unwrap();

    let line = "candidate:7 1 udp 5 10.0.0.7 9 typ host";
    orch.on_remote_candidate(&key("b"), candidate(line)).await.unwrap();

    assert_eq!(log.count(&Call::RemoteCandidate("b".into(), line.into())), 1);
    assert_eq!(log.count(&Call::RemoteCandidate("a".into(), line.into())), 0);
}

#[tokio::test]
async fn reconnecting_receiver_replaces_session_and_drops_stale_media() {
    let (mut orch, mut media, log) = authorized();

    orch.on_receiver_online(key("r1")).await.unwrap();
    let old_sink = log.sink("r1");

    orch.on_receiver_online(key("r1")).await.unwrap();
    assert_eq!(log.disposed("r1"), 1);
    assert_eq!(orch.active_count(), 1);
    // The pipeline stays up across the replacement.
    assert_eq!(log.count(&Call::Prepare), 1);
    assert_eq!(log.count(&Call::Release), 0);

    let stale = candidate("candidate:1 1 udp 1 10.0.0.1 9 typ host");
    let fresh = candidate("candidate:2 1 udp 1 10.0.0.1 9 typ host");
    assert!(old_sink.emit(stale));
    assert!(log.sink("r1").emit(fresh.clone()));

    let Some(MediaEvent::Candidate(first)) = media.recv().await else {
        panic!("expected a candidate");
    };
    assert_eq!(orch.on_local_candidate(first), None);

    let Some(MediaEvent::Candidate(second)) = media.recv().await else {
        panic!("expected a candidate");
    };
    assert_eq!(
        orch.on_local_candidate(second),
        Some(SignalOut::Candidate {
            key: key("r1"),
            candidate: fresh,
        })
    );
}

#[tokio::test]
async fn failed_offer_disposes_session_and_releases_pipeline() {
    let (mut orch, _media, log) = authorized();
    log.fail_offer_for("r1");

    let err = orch.on_receiver_online(key("r1")).await.unwrap_err();
    assert!(matches!(err, SenderError::Media(_)));
    assert!(!orch.has_session(&key("r1")));
    assert!(!orch.is_prepared());
    assert_eq!(log.disposed("r1"), 1);
    assert_eq!(log.count(&Call::Release), 1);
}

#[tokio::test]
async fn failed_offer_keeps_pipeline_for_other_sessions() {
    let (mut orch, _media, log) = authorized();
    orch.on_receiver_online(key("a")).await.unwrap();
    log.fail_offer_for("b");

    assert!(orch.on_receiver_online(key("b")).await.is_err());
    assert!(orch.is_prepared());
    assert_eq!(orch.active_count(), 1);
    assert_eq!(log.count(&Call::Release), 0);
}

#[tokio::test]
async fn release_all_disposes_everything_once() {
    let (mut orch, _media, log) = authorized();
    orch.on_receiver_online(key("a")).await.unwrap();
    orch.on_receiver_online(key("b")).await.unwrap();

    orch.release_all().unwrap();
    assert_eq!(log.disposed("a"), 1);
    assert_eq!(log.disposed("b"), 1);
    assert_eq!(log.count(&Call::Release), 1);
    assert!(!orch.is_prepared());

    orch.release_all().unwrap();
    assert_eq!(log.count(&Call::Release), 1);
}

#[tokio::test]
async fn capture_stop_tears_down_and_waits_for_authorization() {
    let (mut orch, mut media, log) = authorized();
    orch.on_receiver_online(key("a")).await.unwrap();
    orch.on_receiver_online(key("b")).await.unwrap();

    assert!(log.monitor().capture_stopped("revoked from system UI"));
    let Some(MediaEvent::CaptureStopped { epoch, reason }) = media.recv().await else {
        panic!("expected a capture stop");
    };
    assert!(orch.on_capture_stopped(epoch, &reason).unwrap());

    assert!(!orch.is_prepared());
    assert_eq!(orch.active_count(), 0);
    assert_eq!(log.disposed("a"), 1);
    assert_eq!(log.disposed("b"), 1);
    assert_eq!(log.count(&Call::Release), 1);
    assert!(orch.is_waiting(&key("a")));
    assert!(orch.is_waiting(&key("b")));

    // Without a fresh authorization nothing is prepared again.
    let err = orch.on_receiver_online(key("c")).await.unwrap_err();
    assert!(matches!(err, SenderError::MissingAuthorization));
    assert!(!orch.is_prepared());
    assert_eq!(log.count(&Call::Prepare), 1);

    let signals = orch.authorize("granted".to_string()).await.unwrap();
    let mut keys: Vec<_> = signals.iter().map(|s| s.key().to_string()).collect();
    keys.sort();
    assert_eq!(keys, vec!["a", "b", "c"]);
    assert!(orch.is_prepared());
    assert_eq!(log.count(&Call::Prepare), 2);
}

#[tokio::test]
async fn capture_stop_from_earlier_prepare_is_ignored() {
    let (mut orch, _media, log) = authorized();
    orch.on_receiver_online(key("a")).await.unwrap();
    let old_monitor = log.monitor();
    orch.on_receiver_offline(&key("a")).await.unwrap();

    orch.on_receiver_online(key("b")).await.unwrap();
    assert_ne!(log.monitor().epoch(), old_monitor.epoch());

    assert!(!orch.on_capture_stopped(old_monitor.epoch(), "late").unwrap());
    assert!(orch.is_prepared());
    assert!(orch.has_session(&key("b")));
    assert_eq!(log.count(&Call::Release), 1);
}

#[tokio::test]
async fn capture_stop_while_released_is_ignored() {
    let (mut orch, _media, log) = authorized();
    orch.on_receiver_online(key("a")).await.unwrap();
    let monitor = log.monitor();
    orch.on_receiver_offline(&key("a")).await.unwrap();

    assert!(!orch.on_capture_stopped(monitor.epoch(), "late").unwrap());
    assert!(!orch.is_prepared());
    assert!(!orch.is_waiting(&key("a")));
}
