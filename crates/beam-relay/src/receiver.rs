//! One receiver connection: registers itself, relays answers and candidates
//! to the sender, and reports its own departure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beam_common::{Frame, FromReceiver, ReceiverKey};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::registry::ReceiverHandle;
use crate::state::RelayState;

pub struct ReceiverSession {
    state: Arc<RelayState>,
    handle: ReceiverHandle,
    closed: AtomicBool,
}

impl ReceiverSession {
    /// Register the receiver and, if a sender is attached, introduce the two.
    ///
    /// A previous connection under the same key is displaced and told to
    /// close; its own cleanup will then find the entry no longer its own.
    pub async fn open(
        state: Arc<RelayState>,
        key: ReceiverKey,
        tx: mpsc::Sender<String>,
        shutdown: CancellationToken,
    ) -> Self {
        let handle = ReceiverHandle::new(key, state.next_connection_id(), tx, shutdown);

        if let Some(previous) = state.registry().register(handle.clone()).await {
            tracing::info!(
                key = %handle.key,
                previous = previous.connection_id,
                "Receiver key re-registered, closing previous connection"
            );
            previous.disconnect();
        }

        state
            .with_sender(|sender| {
                sender.receiver_online(&handle.key);
                handle.device_online();
            })
            .await;

        tracing::info!(
            key = %handle.key,
            connection = handle.connection_id,
            "Receiver online"
        );
        Self {
            state,
            handle,
            closed: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &ReceiverKey {
        &self.handle.key
    }

    /// Relay one inbound text frame to the sender. Anything that is not an
    /// answer or candidate is ignored.
    pub async fn handle_text(&self, text: &str) {
        let msg = match FromReceiver::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(key = %self.handle.key, error = %e, "Ignoring receiver frame");
                return;
            }
        };

        let Some(sender) = self.state.sender().await else {
            tracing::debug!(key = %self.handle.key, "No sender attached, dropping frame");
            return;
        };

        match msg {
            FromReceiver::Answer(payload) => sender.answer_to(&self.handle.key, payload),
            FromReceiver::IceCandidate(payload) => sender.ice_candidate(&self.handle.key, payload),
        }
    }

    /// Tear the session down. Safe to call more than once; only the first
    /// call has any effect.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let removed = self
            .state
            .registry()
            .unregister(&self.handle.key, self.handle.connection_id)
            .await;

        // A displaced connection no longer speaks for this key.
        if removed {
            self.state
                .with_sender(|sender| sender.receiver_offline(&self.handle.key))
                .await;
        }

        tracing::info!(
            key = %self.handle.key,
            connection = self.handle.connection_id,
            "Receiver closed"
        );
    }

    pub fn is_available(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RelayOptions, SenderHandle};

    struct Fixture {
        state: Arc<RelayState>,
        sender_rx: mpsc::Receiver<String>,
    }

    async fn with_sender() -> Fixture {
        let state = Arc::new(RelayState::new(RelayOptions::default()));
        let (tx, sender_rx) = mpsc::channel(32);
        let handle = SenderHandle::new(state.next_connection_id(), tx, CancellationToken::new());
        state.install_sender(handle).await.unwrap();
        Fixture { state, sender_rx }
    }

    async fn receiver(
        state: &Arc<RelayState>,
        key: &str,
    ) -> (ReceiverSession, mpsc::Receiver<String>, CancellationToken) {
        let (tx, rx) = mpsc::channel(32);
        let token = CancellationToken::new();
        let session =
            ReceiverSession::open(Arc::clone(state), ReceiverKey::new(key), tx, token.clone())
                .await;
        (session, rx, token)
    }

    #[tokio::test]
    async fn open_without_sender_only_registers() {
        let state = Arc::new(RelayState::new(RelayOptions::default()));
        let (session, mut rx, _) = receiver(&state, "r1").await;

        assert!(state.registry().get(session.key()).await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn open_with_sender_announces_both_ways() {
        let mut fx = with_sender().await;
        let (_session, mut rx, _) = receiver(&fx.state, "r1").await;

        assert_eq!(fx.sender_rx.recv().await.unwrap(), "receiver-online|r1");
        assert_eq!(rx.recv().await.unwrap(), "device-online|");
    }

    #[tokio::test]
    async fn relays_answer_and_candidate_with_key() {
        let mut fx = with_sender().await;
        let (session, _rx, _) = receiver(&fx.state, "r1").await;
        fx.sender_rx.recv().await.unwrap();

        session.handle_text(r#"answer|{"type":"answer","sdp":"v=0"}"#).await;
        session.handle_text("onIceCandidate|{\"candidate\":\"c|1\"}").await;

        assert_eq!(
            fx.sender_rx.recv().await.unwrap(),
            r#"answer|r1|{"type":"answer","sdp":"v=0"}"#
        );
        assert_eq!(
            fx.sender_rx.recv().await.unwrap(),
            "onIceCandidate|r1|{\"candidate\":\"c|1\"}"
        );
    }

    #[tokio::test]
    async fn malformed_and_unknown_frames_are_ignored() {
        let mut fx = with_sender().await;
        let (session, _rx, _) = receiver(&fx.state, "r1").await;
        fx.sender_rx.recv().await.unwrap();

        session.handle_text("garbage-no-separator").await;
        session.handle_text("offer|{}").await;
        session.handle_text("device-online|").await;

        assert!(fx.sender_rx.try_recv().is_err());
        assert!(session.is_available());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let mut fx = with_sender().await;
        let (session, _rx, _) = receiver(&fx.state, "r1").await;
        fx.sender_rx.recv().await.unwrap();

        session.close().await;
        session.close().await;

        assert_eq!(fx.sender_rx.recv().await.unwrap(), "receiver-offline|r1");
        assert!(fx.sender_rx.try_recv().is_err());
        assert!(fx.state.registry().is_empty().await);
        assert!(!session.is_available());
    }

    #[tokio::test]
    async fn same_key_reconnect_displaces_previous_connection() {
        let mut fx = with_sender().await;
        let (old, _old_rx, old_token) = receiver(&fx.state, "r1").await;
        let (new, _new_rx, new_token) = receiver(&fx.state, "r1").await;
        assert_eq!(fx.sender_rx.recv().await.unwrap(), "receiver-online|r1");
        assert_eq!(fx.sender_rx.recv().await.unwrap(), "receiver-online|r1");
        assert!(old_token.is_cancelled());
        assert!(!new_token.is_cancelled());

        // The displaced connection's cleanup neither evicts nor reports.
        old.close().await;
        assert!(fx.sender_rx.try_recv().is_err());
        assert!(fx.state.registry().get(new.key()).await.is_some());

        new.close().await;
        assert_eq!(fx.sender_rx.recv().await.unwrap(), "receiver-offline|r1");
    }
}
