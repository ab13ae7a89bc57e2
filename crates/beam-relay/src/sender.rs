//! The sender connection: announces registered receivers, routes offers and
//! candidates by key, and tells every receiver when the device goes away.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beam_common::{Frame, FromSender, ReceiverKey};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::registry::ReceiverHandle;
use crate::state::{RelayState, SenderHandle, SenderRejected};

pub struct SenderSession {
    state: Arc<RelayState>,
    handle: SenderHandle,
    closed: AtomicBool,
}

impl SenderSession {
    /// Claim the sender slot and introduce every registered receiver.
    pub async fn open(
        state: Arc<RelayState>,
        tx: mpsc::Sender<String>,
        shutdown: CancellationToken,
    ) -> Result<Self, SenderRejected> {
        let handle = SenderHandle::new(state.next_connection_id(), tx, shutdown);
        let announced = state.install_sender(handle.clone()).await?;

        tracing::info!(
            connection = handle.connection_id,
            receivers = announced,
            "Sender online"
        );
        Ok(Self {
            state,
            handle,
            closed: AtomicBool::new(false),
        })
    }

    pub fn connection_id(&self) -> u64 {
        self.handle.connection_id
    }

    /// Route one inbound frame to the receiver it names. Frames for keys
    /// that are no longer registered are dropped.
    pub async fn handle_text(&self, text: &str) {
        let msg = match FromSender::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring sender frame");
                return;
            }
        };

        match msg {
            FromSender::Offer { key, payload } => {
                if let Some(receiver) = self.receiver(&key).await {
                    receiver.offer_to(payload);
                }
            }
            FromSender::IceCandidate { key, payload } => {
                if let Some(receiver) = self.receiver(&key).await {
                    receiver.ice_candidate(payload);
                }
            }
        }
    }

    /// Notify every receiver and release the sender slot. Safe to call more
    /// than once. A sender that was displaced by a newer one leaves quietly.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        match self.state.release_sender(self.handle.connection_id).await {
            Some(notified) => tracing::info!(
                connection = self.handle.connection_id,
                receivers = notified,
                "Sender closed"
            ),
            None => tracing::info!(
                connection = self.handle.connection_id,
                "Displaced sender closed"
            ),
        }
    }

    async fn receiver(&self, key: &ReceiverKey) -> Option<ReceiverHandle> {
        let receiver = self.state.registry().get(key).await;
        if receiver.is_none() {
            tracing::debug!(key = %key, "Receiver gone, dropping frame");
        }
        receiver
    }
}
