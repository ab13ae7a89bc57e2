//! Public handle for the signaling task.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use super::connection::connection_loop;
use super::types::{ChannelState, SignalingCommand, SignalingEvent};
use crate::codec::{JsonCodec, PayloadCodec};
use crate::config::SenderConfig;
use crate::error::{Result, SenderError};
use crate::media::{MediaEvent, MediaPipeline};
use crate::orchestrator::PeerSessionOrchestrator;

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle to a running signaling task.
///
/// The task owns the socket and the orchestrator. Dropping the handle
/// without calling [`stop`](Self::stop) still ends the task, but nobody
/// waits for it.
pub struct SignalingClient<A> {
    command_tx: mpsc::Sender<SignalingCommand<A>>,
    state: Arc<RwLock<ChannelState>>,
    task: JoinHandle<Result<()>>,
}

impl<A: Send + 'static> SignalingClient<A> {
    /// Start the signaling task with JSON payloads.
    /// Returns `(client, event_receiver)`.
    pub fn connect<P>(
        config: SenderConfig,
        orchestrator: PeerSessionOrchestrator<P>,
        media: mpsc::UnboundedReceiver<MediaEvent>,
    ) -> Result<(Self, mpsc::Receiver<SignalingEvent>)>
    where
        P: MediaPipeline<Authorization = A> + 'static,
    {
        Self::connect_with_codec(config, orchestrator, media, JsonCodec)
    }

    /// Fails without spawning anything when `config` does not validate.
    pub fn connect_with_codec<P, C>(
        config: SenderConfig,
        orchestrator: PeerSessionOrchestrator<P>,
        media: mpsc::UnboundedReceiver<MediaEvent>,
        codec: C,
    ) -> Result<(Self, mpsc::Receiver<SignalingEvent>)>
    where
        P: MediaPipeline<Authorization = A> + 'static,
        C: PayloadCodec + 'static,
    {
        config.validate()?;
        let (event_tx, event_rx) = mpsc::channel(config.event_capacity);
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let state = Arc::new(RwLock::new(ChannelState::Disconnected));

        let task = tokio::spawn(connection_loop(
            config,
            orchestrator,
            media,
            codec,
            Arc::clone(&state),
            event_tx,
            command_rx,
        ));

        let client = Self {
            command_tx,
            state,
            task,
        };
        Ok((client, event_rx))
    }

    /// Hand the capture authorization to the task. Receivers already
    /// waiting for it get offers right away.
    pub async fn authorize(&self, authorization: A) -> Result<()> {
        self.command_tx
            .send(SignalingCommand::Authorize(authorization))
            .await
            .map_err(|_| SenderError::Signaling("signaling task has exited".into()))
    }

    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the socket, dispose all media, and wait for the task to end.
    /// Returns the error the task exited with, if it had already failed.
    pub async fn stop(self) -> Result<()> {
        // A closed channel means the task already exited; its result is
        // still waiting in the join handle.
        let _ = self.command_tx.send(SignalingCommand::Stop).await;
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(SenderError::Signaling(format!("signaling task failed: {e}"))),
        }
    }
}
