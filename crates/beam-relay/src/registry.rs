//! Receiver registry: maps receiver keys to their live connection handles.

use std::collections::HashMap;
use std::sync::Arc;

use beam_common::{Frame, ReceiverKey, ToReceiver};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Outbound half of one receiver connection.
///
/// Sends never wait: a closed channel means the connection task is already
/// on its way out and will run its own cleanup, a full one means the peer
/// has stalled.
#[derive(Debug, Clone)]
pub struct ReceiverHandle {
    pub key: ReceiverKey,
    pub connection_id: u64,
    tx: mpsc::Sender<String>,
    shutdown: CancellationToken,
}

impl ReceiverHandle {
    pub fn new(
        key: ReceiverKey,
        connection_id: u64,
        tx: mpsc::Sender<String>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            key,
            connection_id,
            tx,
            shutdown,
        }
    }

    pub fn device_online(&self) {
        self.send(ToReceiver::DeviceOnline);
    }

    pub fn device_offline(&self) {
        self.send(ToReceiver::DeviceOffline);
    }

    pub fn offer_to(&self, payload: String) {
        self.send(ToReceiver::Offer(payload));
    }

    pub fn ice_candidate(&self, payload: String) {
        self.send(ToReceiver::IceCandidate(payload));
    }

    /// Ask the connection task to close the socket.
    pub fn disconnect(&self) {
        self.shutdown.cancel();
    }

    /// Queue a frame without waiting. A receiver whose queue is full is not
    /// keeping up and gets disconnected.
    fn send(&self, msg: ToReceiver) {
        match self.tx.try_send(msg.encode()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    key = %self.key,
                    connection = self.connection_id,
                    "Receiver queue full, disconnecting"
                );
                self.disconnect();
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(key = %self.key, "Receiver channel closed, dropping frame");
            }
        }
    }
}

/// Thread-safe receiver registry.
///
/// The lock is only held to mutate the map or copy it out; callers never
/// send on a handle while holding it.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    receivers: Arc<Mutex<HashMap<ReceiverKey, ReceiverHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `handle.key`. Returns the handle
    /// that was displaced, if any.
    pub async fn register(&self, handle: ReceiverHandle) -> Option<ReceiverHandle> {
        self.receivers
            .lock()
            .await
            .insert(handle.key.clone(), handle)
    }

    /// Remove the entry for `key` if it still belongs to `connection_id`.
    /// Returns true if an entry was removed.
    pub async fn unregister(&self, key: &ReceiverKey, connection_id: u64) -> bool {
        let mut map = self.receivers.lock().await;
        match map.get(key) {
            Some(handle) if handle.connection_id == connection_id => {
                map.remove(key);
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, key: &ReceiverKey) -> Option<ReceiverHandle> {
        self.receivers.lock().await.get(key).cloned()
    }

    /// Copy of every registered handle, taken under the lock.
    pub async fn snapshot(&self) -> Vec<ReceiverHandle> {
        self.receivers.lock().await.values().cloned().collect()
    }

    /// Run `f` on a snapshot of all receivers, outside the lock. Returns the
    /// number of receivers visited.
    pub async fn for_each<F>(&self, mut f: F) -> usize
    where
        F: FnMut(ReceiverHandle),
    {
        let receivers = self.snapshot().await;
        let count = receivers.len();
        for receiver in receivers {
            f(receiver);
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.receivers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
