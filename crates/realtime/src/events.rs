//! Connection lifecycle events raised by the [`Channel`](crate::channel::Channel).
//!
//! These carry no payload beyond the transition itself. Transport error
//! details are logged where they happen and never handed to subscribers.

/// A connection lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// The WebSocket handshake completed.
    Opened,

    /// The connection ended (server close, transport failure, or teardown).
    Closed,

    /// Connecting failed, or the transport failed mid-session.
    Errored,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Opened => "opened",
            LifecycleEvent::Closed => "closed",
            LifecycleEvent::Errored => "errored",
        }
    }
}

impl std::fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
