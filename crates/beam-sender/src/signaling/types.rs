//! Channel state, events, and commands for the signaling task.

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Connection state of the signaling channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Disconnected,
    Connecting,
    Open,
}

/// Lifecycle notifications from the signaling task.
///
/// Delivered best-effort: when the receiver falls behind, events are
/// dropped rather than stalling signaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    Connecting,
    Connected,
    Disconnected,
    Error(String),
    /// Capture ended on its own. All sessions were torn down; authorize
    /// again to resume offering.
    CaptureStopped(String),
    /// The task has exited after a stop request.
    Stopped,
}

/// Commands from [`SignalingClient`](super::SignalingClient) to the task.
#[derive(Debug)]
pub(crate) enum SignalingCommand<A> {
    Authorize(A),
    Stop,
}
