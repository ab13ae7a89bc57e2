//! Background connection loop with fixed-delay reconnect.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::handler::{encode_signal, handle_frame};
use super::types::{ChannelState, SignalingCommand, SignalingEvent};
use crate::codec::PayloadCodec;
use crate::config::SenderConfig;
use crate::error::{Result, SenderError};
use crate::media::{MediaEvent, MediaPipeline};
use crate::orchestrator::{PeerSessionOrchestrator, SignalOut};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why an open connection ended.
enum SessionEnd {
    /// Transport closed or failed; retry after the delay.
    Dropped,
    /// Stop requested, or the client handle went away.
    Stopped,
    Fatal(SenderError),
}

// ---------------------------------------------------------------------------
// Connection Loop
// ---------------------------------------------------------------------------

/// Runs until stopped or until a fatal error. Every exit path disposes all
/// media first.
pub(crate) async fn connection_loop<P, C>(
    config: SenderConfig,
    mut orchestrator: PeerSessionOrchestrator<P>,
    mut media: mpsc::UnboundedReceiver<MediaEvent>,
    codec: C,
    state: Arc<RwLock<ChannelState>>,
    event_tx: mpsc::Sender<SignalingEvent>,
    mut command_rx: mpsc::Receiver<SignalingCommand<P::Authorization>>,
) -> Result<()>
where
    P: MediaPipeline,
    C: PayloadCodec,
{
    loop {
        *state.write().await = ChannelState::Connecting;
        emit(&event_tx, SignalingEvent::Connecting);
        info!(url = %config.relay_url, "Connecting to relay");

        // Commands are still served while the connect is in flight so a
        // stop does not wait out the timeout.
        let connect = tokio::time::timeout(
            config.connect_timeout(),
            tokio_tungstenite::connect_async(config.relay_url.as_str()),
        );
        tokio::pin!(connect);
        let attempt = loop {
            tokio::select! {
                result = &mut connect => break result,
                cmd = command_rx.recv() => {
                    if !apply_idle_command(cmd, &mut orchestrator) {
                        return finish(&mut orchestrator, &state, &event_tx).await;
                    }
                }
            }
        };

        match attempt {
            Ok(Ok((ws, _))) => {
                *state.write().await = ChannelState::Open;
                emit(&event_tx, SignalingEvent::Connected);
                info!("Connected to relay");

                let end = run_session(
                    ws,
                    &mut orchestrator,
                    &mut media,
                    &codec,
                    &event_tx,
                    &mut command_rx,
                )
                .await;

                match end {
                    SessionEnd::Dropped => {
                        orchestrator.release_all()?;
                        *state.write().await = ChannelState::Disconnected;
                        emit(&event_tx, SignalingEvent::Disconnected);
                    }
                    SessionEnd::Stopped => {
                        return finish(&mut orchestrator, &state, &event_tx).await;
                    }
                    SessionEnd::Fatal(e) => {
                        error!(error = %e, "Signaling stopped on fatal error");
                        let _ = orchestrator.release_all();
                        *state.write().await = ChannelState::Disconnected;
                        emit(&event_tx, SignalingEvent::Error(e.to_string()));
                        return Err(e);
                    }
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to connect to relay");
                *state.write().await = ChannelState::Disconnected;
                emit(&event_tx, SignalingEvent::Error(format!("connection failed: {e}")));
            }
            Err(_elapsed) => {
                warn!(
                    timeout_secs = config.connect_timeout_secs,
                    "Relay connection timed out"
                );
                *state.write().await = ChannelState::Disconnected;
                emit(
                    &event_tx,
                    SignalingEvent::Error(format!(
                        "connection timed out after {}s",
                        config.connect_timeout_secs
                    )),
                );
            }
        }

        // Constant backoff, interruptible by stop.
        info!(delay_ms = config.retry_delay_ms, "Reconnecting after delay");
        let delay = tokio::time::sleep(config.retry_delay());
        tokio::pin!(delay);
        loop {
            tokio::select! {
                _ = &mut delay => break,
                cmd = command_rx.recv() => {
                    if !apply_idle_command(cmd, &mut orchestrator) {
                        return finish(&mut orchestrator, &state, &event_tx).await;
                    }
                }
            }
        }
    }
}

/// Serve one open connection until it drops or the task is told to stop.
async fn run_session<P, C>(
    ws: WsStream,
    orchestrator: &mut PeerSessionOrchestrator<P>,
    media: &mut mpsc::UnboundedReceiver<MediaEvent>,
    codec: &C,
    event_tx: &mpsc::Sender<SignalingEvent>,
    command_rx: &mut mpsc::Receiver<SignalingCommand<P::Authorization>>,
) -> SessionEnd
where
    P: MediaPipeline,
    C: PayloadCodec,
{
    let (mut sink, mut stream) = ws.split();

    loop {
        let outbound: Vec<SignalOut> = tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    match handle_frame(orchestrator, codec, text.as_str()).await {
                        Ok(signal) => signal.into_iter().collect(),
                        Err(e) if e.is_fatal() => return SessionEnd::Fatal(e),
                        Err(e) => {
                            warn!(error = %e, "Failed to handle relay frame");
                            Vec::new()
                        }
                    }
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if sink.send(WsMessage::Pong(data)).await.is_err() {
                        return SessionEnd::Dropped;
                    }
                    Vec::new()
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!("Relay closed the connection");
                    return SessionEnd::Dropped;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket error");
                    return SessionEnd::Dropped;
                }
                Some(Ok(_)) => Vec::new(),
            },

            Some(event) = media.recv() => match event {
                MediaEvent::Candidate(local) => {
                    orchestrator.on_local_candidate(local).into_iter().collect()
                }
                MediaEvent::CaptureStopped { epoch, reason } => {
                    match orchestrator.on_capture_stopped(epoch, &reason) {
                        Ok(true) => emit(event_tx, SignalingEvent::CaptureStopped(reason)),
                        Ok(false) => {}
                        Err(e) => return SessionEnd::Fatal(e),
                    }
                    Vec::new()
                }
            },

            cmd = command_rx.recv() => match cmd {
                Some(SignalingCommand::Authorize(authorization)) => {
                    match orchestrator.authorize(authorization).await {
                        Ok(signals) => signals,
                        Err(e) if e.is_fatal() => return SessionEnd::Fatal(e),
                        Err(e) => {
                            warn!(error = %e, "Authorization failed");
                            Vec::new()
                        }
                    }
                }
                Some(SignalingCommand::Stop) | None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    return SessionEnd::Stopped;
                }
            },
        };

        for signal in outbound {
            let key = signal.key().clone();
            let text = match encode_signal(codec, signal) {
                Ok(text) => text,
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to encode signal");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                return SessionEnd::Dropped;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Handle a command while no connection is open. Returns false when the
/// task should stop.
fn apply_idle_command<P: MediaPipeline>(
    cmd: Option<SignalingCommand<P::Authorization>>,
    orchestrator: &mut PeerSessionOrchestrator<P>,
) -> bool {
    match cmd {
        Some(SignalingCommand::Authorize(authorization)) => {
            orchestrator.set_authorization(authorization);
            true
        }
        Some(SignalingCommand::Stop) | None => false,
    }
}

async fn finish<P: MediaPipeline>(
    orchestrator: &mut PeerSessionOrchestrator<P>,
    state: &RwLock<ChannelState>,
    event_tx: &mpsc::Sender<SignalingEvent>,
) -> Result<()> {
    let released = orchestrator.release_all();
    *state.write().await = ChannelState::Disconnected;
    info!("Signaling stopped");
    emit(event_tx, SignalingEvent::Stopped);
    released
}

/// Best-effort event delivery; never blocks the signaling task.
fn emit(event_tx: &mpsc::Sender<SignalingEvent>, event: SignalingEvent) {
    if let Err(e) = event_tx.try_send(event) {
        debug!(error = %e, "Signaling event dropped");
    }
}
