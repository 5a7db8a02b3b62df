//! Realtime WebSocket channel.
//!
//! [`Channel`] owns the single long-lived connection to the realtime
//! endpoint. It classifies inbound frames, swallows the `PING` heartbeat,
//! and reports everything else to a [`FrameListener`] together with the
//! connection lifecycle transitions.
//!
//! The channel never reconnects on its own. A dropped connection raises
//! [`LifecycleEvent::Closed`] and [`Channel::run`] returns.

use futures::{Stream, StreamExt};
use plexsync_core::message_types::{HEARTBEAT_FRAME, REALTIME_PATH};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::events::LifecycleEvent;

// ---------------------------------------------------------------------------
// Listener seam
// ---------------------------------------------------------------------------

/// Receiver of everything a [`Channel`] observes.
pub trait FrameListener {
    /// A connection lifecycle transition.
    fn on_lifecycle(&mut self, event: LifecycleEvent);

    /// A non-heartbeat text frame, verbatim.
    fn on_frame(&mut self, text: &str);
}

// ---------------------------------------------------------------------------
// Frame classification
// ---------------------------------------------------------------------------

/// How the channel treats one inbound WebSocket message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The application-level keep-alive. Never forwarded.
    Heartbeat,
    /// A text frame to forward to the listener.
    Text(String),
    /// The server is closing the connection.
    Close(Option<CloseFrame<'static>>),
    /// Binary and control frames. Control frames are answered by tungstenite.
    Ignored,
}

/// Classify a raw WebSocket message.
pub fn classify(message: Message) -> Inbound {
    match message {
        Message::Text(text) if text == HEARTBEAT_FRAME => Inbound::Heartbeat,
        Message::Text(text) => Inbound::Text(text),
        Message::Close(frame) => Inbound::Close(frame),
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
            Inbound::Ignored
        }
    }
}

// ---------------------------------------------------------------------------
// Session outcome
// ---------------------------------------------------------------------------

/// Transport failures. Reported to subscribers only as
/// [`LifecycleEvent::Errored`]; the detail is logged and returned from
/// [`Channel::run`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// The transport failed on an established connection.
    #[error("Receive error: {0}")]
    Receive(String),
}

/// Why a channel session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The server sent a Close frame.
    ServerClosed,
    /// The stream ended without a Close frame.
    StreamEnded,
    /// The cancellation token fired.
    Cancelled,
    /// Connecting or receiving failed.
    Failed(ChannelError),
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Build the realtime endpoint URL from a WebSocket root such as
/// `ws://localhost:8080`.
pub fn realtime_endpoint(ws_root: &str) -> String {
    format!("{}{}", ws_root.trim_end_matches('/'), REALTIME_PATH)
}

/// One connection to the realtime endpoint.
pub struct Channel {
    endpoint: String,
    session_id: Uuid,
}

impl Channel {
    /// Create a channel for `endpoint` (e.g. `ws://host:8080/api/ws`).
    ///
    /// Nothing is opened until [`run`](Self::run) is called.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            session_id: Uuid::new_v4(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Identifier attached to this channel's log lines.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Connect, pump frames into `listener`, and report lifecycle events.
    ///
    /// * Connect failure: `Errored`.
    /// * Server close or end of stream: `Opened` ... `Closed`.
    /// * Receive failure: `Opened` ... `Errored`, `Closed`.
    /// * Cancellation after connect: a Close frame is sent, then `Closed`.
    ///
    /// Never returns an error; the outcome is described by [`SessionEnd`].
    pub async fn run<L>(&self, listener: &mut L, cancel: &CancellationToken) -> SessionEnd
    where
        L: FrameListener + ?Sized,
    {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            result = connect_async(self.endpoint.as_str()) => result,
        };

        let mut ws_stream = match connected {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                let err = ChannelError::Connect(format!(
                    "Failed to connect to {}: {e}",
                    self.endpoint
                ));
                tracing::warn!(session_id = %self.session_id, error = %err, "Realtime connect failed");
                listener.on_lifecycle(LifecycleEvent::Errored);
                return SessionEnd::Failed(err);
            }
        };

        tracing::info!(
            session_id = %self.session_id,
            "Connected to realtime endpoint at {}",
            self.endpoint,
        );
        listener.on_lifecycle(LifecycleEvent::Opened);

        let end = pump(&mut ws_stream, listener, cancel).await;

        match &end {
            SessionEnd::Cancelled => {
                if let Err(e) = ws_stream.close(None).await {
                    tracing::debug!(session_id = %self.session_id, error = %e, "Close handshake failed");
                }
            }
            SessionEnd::Failed(err) => {
                tracing::error!(session_id = %self.session_id, error = %err, "Realtime transport failed");
                listener.on_lifecycle(LifecycleEvent::Errored);
            }
            SessionEnd::ServerClosed | SessionEnd::StreamEnded => {}
        }

        tracing::info!(session_id = %self.session_id, outcome = ?end, "Realtime channel closed");
        listener.on_lifecycle(LifecycleEvent::Closed);
        end
    }
}

/// Read frames from `stream` until it closes, fails, or `cancel` fires.
///
/// Heartbeats and non-text frames are dropped here; text frames go to
/// [`FrameListener::on_frame`] in arrival order. Lifecycle events are the
/// caller's job.
pub async fn pump<S, E, L>(stream: &mut S, listener: &mut L, cancel: &CancellationToken) -> SessionEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
    L: FrameListener + ?Sized,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionEnd::Cancelled,
            next = stream.next() => next,
        };

        match next {
            Some(Ok(message)) => match classify(message) {
                Inbound::Heartbeat => tracing::trace!("Heartbeat"),
                Inbound::Text(text) => listener.on_frame(&text),
                Inbound::Close(frame) => {
                    tracing::info!(?frame, "Realtime endpoint closed the connection");
                    return SessionEnd::ServerClosed;
                }
                Inbound::Ignored => tracing::trace!("Ignoring non-text frame"),
            },
            Some(Err(e)) => return SessionEnd::Failed(ChannelError::Receive(e.to_string())),
            None => return SessionEnd::StreamEnded,
        }
    }
}
