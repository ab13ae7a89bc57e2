//! beam-relay: WebSocket signaling relay for one-to-many screen broadcast.
//!
//! One sender connects at `/ws/sender`, any number of receivers connect at
//! `/ws/receiver/{key}`. The relay tells each side who is online and routes
//! offers, answers and ICE candidates by receiver key. It never inspects
//! the negotiation payloads.

mod connection;
mod receiver;
mod registry;
mod sender;
mod server;
mod state;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use crate::server::serve;
use crate::state::{RelayOptions, RelayState, SenderPolicy};

#[derive(Parser)]
#[command(name = "beam-relay", about = "WebSocket signaling relay for screen broadcast")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Seconds between keepalive pings.
    #[arg(long, default_value_t = 15)]
    ping_interval: u64,

    /// Seconds of silence tolerated after a ping before a connection is dropped.
    #[arg(long, default_value_t = 15)]
    idle_timeout: u64,

    /// What to do when a second sender connects.
    #[arg(long, value_enum, default_value_t = SenderPolicy::Replace)]
    sender_policy: SenderPolicy,

    /// Outbound queue length per connection.
    #[arg(long, default_value_t = 256)]
    channel_capacity: usize,
}

impl Args {
    fn options(&self) -> RelayOptions {
        RelayOptions {
            sender_policy: self.sender_policy,
            ping_interval: Duration::from_secs(self.ping_interval.max(1)),
            idle_timeout: Duration::from_secs(self.idle_timeout),
            channel_capacity: self.channel_capacity.max(1),
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beam_relay=info".into()),
        )
        .init();

    let args = Args::parse();
    let state = Arc::new(RelayState::new(args.options()));

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Failed to bind TCP listener");

    tracing::info!(policy = ?args.sender_policy, "beam-relay listening on {}", addr);

    serve(listener, state).await;
}
