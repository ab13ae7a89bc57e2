//! TCP accept loop.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::connection::handle_connection;
use crate::state::RelayState;

/// Accept connections forever, one task per connection.
pub async fn serve(listener: TcpListener, state: Arc<RelayState>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_connection(stream, addr, state).await;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
}
