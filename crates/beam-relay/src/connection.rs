//! Per-connection handler: route by URL path, open the matching session,
//! then pump frames between the socket and the session until either side
//! goes away.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use beam_common::ReceiverKey;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::receiver::ReceiverSession;
use crate::sender::SenderSession;
use crate::state::RelayState;

pub const SENDER_PATH: &str = "/ws/sender";
pub const RECEIVER_PREFIX: &str = "/ws/receiver/";

/// How long a forced close waits for the close frame to go out.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Which endpoint a client connected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Sender,
    Receiver(ReceiverKey),
}

impl Route {
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        if path == SENDER_PATH {
            return Some(Self::Sender);
        }
        path.strip_prefix(RECEIVER_PREFIX)
            .and_then(ReceiverKey::parse)
            .map(Self::Receiver)
    }
}

enum Peer {
    Sender(SenderSession),
    Receiver(ReceiverSession),
}

impl Peer {
    async fn handle_text(&self, text: &str) {
        match self {
            Self::Sender(session) => session.handle_text(text).await,
            Self::Receiver(session) => session.handle_text(text).await,
        }
    }

    async fn close(&self) {
        match self {
            Self::Sender(session) => session.close().await,
            Self::Receiver(session) => session.close().await,
        }
    }
}

/// Handle a single TCP connection from handshake to cleanup.
pub async fn handle_connection(stream: TcpStream, addr: SocketAddr, state: Arc<RelayState>) {
    let mut route = None;
    let handshake = tokio_tungstenite::accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            match Route::from_path(request.uri().path()) {
                Some(r) => {
                    route = Some(r);
                    Ok(response)
                }
                None => {
                    let mut error = ErrorResponse::new(Some("unknown endpoint".to_string()));
                    *error.status_mut() = StatusCode::NOT_FOUND;
                    Err(error)
                }
            }
        },
    )
    .await;

    let mut ws = match handshake {
        Ok(ws) => ws,
        Err(e) => {
            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
            return;
        }
    };
    let Some(route) = route else {
        return;
    };

    let (tx, rx) = mpsc::channel::<String>(state.options.channel_capacity);
    let shutdown = CancellationToken::new();

    let peer = match route {
        Route::Sender => {
            match SenderSession::open(Arc::clone(&state), tx, shutdown.clone()).await {
                Ok(session) => Peer::Sender(session),
                Err(e) => {
                    tracing::warn!(peer = %addr, error = %e, "Refusing sender");
                    let _ = ws
                        .close(Some(CloseFrame {
                            code: CloseCode::Policy,
                            reason: e.to_string().into(),
                        }))
                        .await;
                    return;
                }
            }
        }
        Route::Receiver(key) => Peer::Receiver(
            ReceiverSession::open(Arc::clone(&state), key, tx, shutdown.clone()).await,
        ),
    };

    pump(ws, &peer, rx, shutdown, addr, &state).await;
    peer.close().await;
}

/// Forward queued outbound frames to the socket and inbound text frames to
/// the session. Returns when the socket closes, errors, goes idle, or the
/// connection is told to shut down.
async fn pump(
    ws: WebSocketStream<TcpStream>,
    peer: &Peer,
    mut rx: mpsc::Receiver<String>,
    shutdown: CancellationToken,
    addr: SocketAddr,
    state: &RelayState,
) {
    let (mut sink, mut stream) = ws.split();
    let ping_interval = state.options.ping_interval;
    let max_silence = ping_interval + state.options.idle_timeout;
    let mut ping =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!(peer = %addr, "Connection shut down by relay");
                let _ = tokio::time::timeout(CLOSE_GRACE, sink.send(Message::Close(None))).await;
                break;
            }

            Some(msg) = rx.recv() => {
                // A peer that stops reading must not pin this task past a
                // forced disconnect.
                let sent = tokio::select! {
                    result = sink.send(Message::Text(msg.into())) => result.is_ok(),
                    _ = shutdown.cancelled() => false,
                };
                if !sent {
                    break;
                }
            }

            _ = ping.tick() => {
                if last_seen.elapsed() > max_silence {
                    tracing::info!(peer = %addr, "Connection idle, closing");
                    break;
                }
                if sink.send(Message::Ping(Vec::<u8>::new().into())).await.is_err() {
                    break;
                }
            }

            frame = stream.next() => {
                last_seen = Instant::now();
                match frame {
                    Some(Ok(Message::Text(text))) => peer.handle_text(text.as_str()).await,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}
