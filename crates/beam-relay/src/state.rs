//! Process-wide relay state, injected into every connection handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use beam_common::{Frame, ReceiverKey, ToSender};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::registry::ConnectionRegistry;

/// What to do when a sender connects while another one is still attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum SenderPolicy {
    /// The newcomer takes over; the previous sender is disconnected.
    #[default]
    Replace,
    /// The newcomer is turned away while a sender is attached.
    Reject,
}

/// Tunables shared by all connections.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub sender_policy: SenderPolicy,
    pub ping_interval: Duration,
    /// Extra silence tolerated after a ping before the connection is dropped.
    pub idle_timeout: Duration,
    /// Capacity of each connection's outbound queue.
    pub channel_capacity: usize,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            sender_policy: SenderPolicy::Replace,
            ping_interval: Duration::from_secs(15),
            idle_timeout: Duration::from_secs(15),
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("a sender is already connected")]
pub struct SenderRejected;

/// Outbound half of the sender connection.
#[derive(Debug, Clone)]
pub struct SenderHandle {
    pub connection_id: u64,
    tx: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl SenderHandle {
    pub fn new(connection_id: u64, tx: mpsc::Sender<String>, shutdown: CancellationToken) -> Self {
        Self {
            connection_id,
            tx,
            shutdown,
        }
    }

    pub fn receiver_online(&self, key: &ReceiverKey) {
        self.send(ToSender::ReceiverOnline(key.clone()));
    }

    pub fn receiver_offline(&self, key: &ReceiverKey) {
        self.send(ToSender::ReceiverOffline(key.clone()));
    }

    pub fn answer_to(&self, key: &ReceiverKey, payload: String) {
        self.send(ToSender::Answer {
            key: key.clone(),
            payload,
        });
    }

    pub fn ice_candidate(&self, key: &ReceiverKey, payload: String) {
        self.send(ToSender::IceCandidate {
            key: key.clone(),
            payload,
        });
    }

    pub fn disconnect(&self) {
        self.shutdown.cancel();
    }

    /// Queue a frame without waiting; a sender that stops draining its
    /// queue is disconnected.
    fn send(&self, msg: ToSender) {
        match self.tx.try_send(msg.encode()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    connection = self.connection_id,
                    "Sender queue full, disconnecting"
                );
                self.disconnect();
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection = self.connection_id,
                    "Sender channel closed, dropping frame"
                );
            }
        }
    }
}

/// Registry plus the single sender slot.
pub struct RelayState {
    registry: ConnectionRegistry,
    sender: Mutex<Option<SenderHandle>>,
    next_connection_id: AtomicU64,
    pub options: RelayOptions,
}

impl RelayState {
    pub fn new(options: RelayOptions) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sender: Mutex::new(None),
            next_connection_id: AtomicU64::new(1),
            options,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The attached sender, if any.
    pub async fn sender(&self) -> Option<SenderHandle> {
        self.sender.lock().await.clone()
    }

    /// Run `f` against the attached sender while holding the slot, so the
    /// sender cannot be replaced or released part-way through.
    pub async fn with_sender<R>(&self, f: impl FnOnce(&SenderHandle) -> R) -> Option<R> {
        self.sender.lock().await.as_ref().map(f)
    }

    /// Claim the sender slot according to the configured policy, then
    /// introduce every registered receiver. Returns the number announced.
    ///
    /// Announcing under the slot lock orders it after any `device-offline`
    /// queued by the previous sender's release.
    pub async fn install_sender(&self, handle: SenderHandle) -> Result<usize, SenderRejected> {
        let mut slot = self.sender.lock().await;
        if let Some(current) = slot.as_ref() {
            match self.options.sender_policy {
                SenderPolicy::Reject => return Err(SenderRejected),
                SenderPolicy::Replace => {
                    tracing::warn!(
                        previous = current.connection_id,
                        next = handle.connection_id,
                        "Second sender connected, disconnecting the previous one"
                    );
                    current.disconnect();
                }
            }
        }

        let announced = self
            .registry
            .for_each(|receiver| {
                receiver.device_online();
                handle.receiver_online(&receiver.key);
            })
            .await;
        *slot = Some(handle);
        Ok(announced)
    }

    /// If `connection_id` still owns the slot, tell every receiver the
    /// device is gone and clear the slot. Returns the number notified, or
    /// `None` when the slot belongs to someone else.
    pub async fn release_sender(&self, connection_id: u64) -> Option<usize> {
        let mut slot = self.sender.lock().await;
        if slot.as_ref().map(|s| s.connection_id) != Some(connection_id) {
            return None;
        }
        let notified = self
            .registry
            .for_each(|receiver| receiver.device_offline())
            .await;
        *slot = None;
        Some(notified)
    }
}
