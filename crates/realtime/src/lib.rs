//! Realtime download-progress channel.
//!
//! Provides the WebSocket [`channel::Channel`] to the realtime endpoint,
//! typed envelope decoding, the publish/subscribe [`dispatcher::Dispatcher`]
//! that routes envelopes and lifecycle events to consumers, and the
//! [`progress::ProgressTracker`] that turns download envelopes into a
//! per-job progress table.

pub mod channel;
pub mod dispatcher;
pub mod events;
pub mod messages;
pub mod progress;

pub use channel::{Channel, FrameListener, SessionEnd};
pub use dispatcher::{Dispatcher, HandlerError, HandlerResult, Interest, SubscriptionToken};
pub use events::LifecycleEvent;
pub use messages::{Envelope, MessageKind};
pub use progress::ProgressTracker;
