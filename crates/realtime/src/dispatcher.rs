//! Typed publish/subscribe dispatcher on top of the [`Channel`](crate::channel::Channel).
//!
//! Consumers register interest in a lifecycle transition or in one
//! envelope kind. Each forwarded frame is decoded once into an
//! [`Envelope`] and handed, in registration order, to every subscription
//! interested in its kind.
//!
//! Dispatch is synchronous. A frame that fails to decode is logged and
//! dropped, and a handler that fails (or panics) is logged and skipped;
//! neither stops the remaining handlers or the next frame.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::channel::FrameListener;
use crate::events::LifecycleEvent;
use crate::messages::{decode_frame, Envelope, Frame, MessageKind};

// ---------------------------------------------------------------------------
// Handler types
// ---------------------------------------------------------------------------

/// A subscription handler failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Error recorded when a handler panicked.
    pub fn panicked(detail: &str) -> Self {
        Self(format!("handler panicked: {detail}"))
    }
}

pub type HandlerResult = Result<(), HandlerError>;

type LifecycleHandler = Box<dyn FnMut(LifecycleEvent) -> HandlerResult + Send>;
type MessageHandler = Box<dyn FnMut(&Envelope) -> HandlerResult + Send>;

enum Handler {
    Lifecycle(LifecycleHandler),
    Message(MessageHandler),
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// What a subscription listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interest {
    Lifecycle(LifecycleEvent),
    Message(MessageKind),
}

/// Handle returned by `subscribe_*`; pass to [`Dispatcher::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

struct Subscription {
    token: SubscriptionToken,
    interest: Interest,
    handler: Handler,
}

/// Counters for frames and handler invocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Text frames handed to the dispatcher.
    pub frames_received: u64,
    /// Frames dropped because they failed to decode.
    pub frames_malformed: u64,
    /// Well-formed frames with a discriminator outside the known set.
    pub frames_unrecognized: u64,
    /// Successful handler invocations.
    pub deliveries: u64,
    /// Handler invocations that returned an error or panicked.
    pub handler_failures: u64,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Subscription registry and router.
///
/// Subscriptions with the same interest are all invoked, in the order they
/// were registered. No deduplication is performed.
#[derive(Default)]
pub struct Dispatcher {
    subscriptions: Vec<Subscription>,
    next_token: u64,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one lifecycle transition.
    pub fn subscribe_lifecycle<F>(&mut self, event: LifecycleEvent, handler: F) -> SubscriptionToken
    where
        F: FnMut(LifecycleEvent) -> HandlerResult + Send + 'static,
    {
        self.register(
            Interest::Lifecycle(event),
            Handler::Lifecycle(Box::new(handler)),
        )
    }

    /// Register a handler for one envelope kind.
    pub fn subscribe_message<F>(&mut self, kind: MessageKind, handler: F) -> SubscriptionToken
    where
        F: FnMut(&Envelope) -> HandlerResult + Send + 'static,
    {
        self.register(Interest::Message(kind), Handler::Message(Box::new(handler)))
    }

    /// Remove a subscription. Returns `false` if the token is unknown.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.token != token);
        self.subscriptions.len() != before
    }

    /// Registered interests, in registration order.
    pub fn interests(&self) -> Vec<(SubscriptionToken, Interest)> {
        self.subscriptions
            .iter()
            .map(|s| (s.token, s.interest))
            .collect()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Decode a text frame and route it.
    ///
    /// Malformed frames are logged and dropped. Returns the number of
    /// handlers that ran successfully.
    pub fn dispatch_frame(&mut self, text: &str) -> usize {
        self.stats.frames_received += 1;

        match decode_frame(text) {
            Ok(Frame::Known(envelope)) => self.dispatch_envelope(&envelope),
            Ok(Frame::Unrecognized(kind)) => {
                self.stats.frames_unrecognized += 1;
                tracing::debug!(kind = %kind, "No route for message kind");
                0
            }
            Err(e) => {
                self.stats.frames_malformed += 1;
                tracing::warn!(error = %e, raw_message = %text, "Dropping malformed realtime frame");
                0
            }
        }
    }

    /// Route an already-decoded envelope to its subscribers.
    pub fn dispatch_envelope(&mut self, envelope: &Envelope) -> usize {
        let interest = Interest::Message(envelope.kind());
        let mut delivered = 0;

        for sub in self.subscriptions.iter_mut() {
            if sub.interest != interest {
                continue;
            }
            let Handler::Message(handler) = &mut sub.handler else {
                continue;
            };
            let outcome = invoke(|| handler(envelope));
            if record(&mut self.stats, sub.token, interest, outcome) {
                delivered += 1;
            }
        }

        delivered
    }

    /// Route a lifecycle transition to its subscribers.
    pub fn dispatch_lifecycle(&mut self, event: LifecycleEvent) -> usize {
        let interest = Interest::Lifecycle(event);
        let mut delivered = 0;

        for sub in self.subscriptions.iter_mut() {
            if sub.interest != interest {
                continue;
            }
            let Handler::Lifecycle(handler) = &mut sub.handler else {
                continue;
            };
            let outcome = invoke(|| handler(event));
            if record(&mut self.stats, sub.token, interest, outcome) {
                delivered += 1;
            }
        }

        delivered
    }

    // ---- private helpers ----

    fn register(&mut self, interest: Interest, handler: Handler) -> SubscriptionToken {
        let token = SubscriptionToken(self.next_token);
        self.next_token += 1;
        self.subscriptions.push(Subscription {
            token,
            interest,
            handler,
        });
        tracing::debug!(token = token.0, ?interest, "Subscription registered");
        token
    }
}

impl FrameListener for Dispatcher {
    fn on_lifecycle(&mut self, event: LifecycleEvent) {
        self.dispatch_lifecycle(event);
    }

    fn on_frame(&mut self, text: &str) {
        self.dispatch_frame(text);
    }
}

/// Run a handler, turning a panic into a [`HandlerError`].
fn invoke<F>(call: F) -> HandlerResult
where
    F: FnOnce() -> HandlerResult,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic payload>".to_string());
            Err(HandlerError::panicked(&detail))
        }
    }
}

/// Update counters for one invocation. Returns `true` on success.
fn record(
    stats: &mut DispatchStats,
    token: SubscriptionToken,
    interest: Interest,
    outcome: HandlerResult,
) -> bool {
    match outcome {
        Ok(()) => {
            stats.deliveries += 1;
            true
        }
        Err(e) => {
            stats.handler_failures += 1;
            tracing::warn!(token = token.0, ?interest, error = %e, "Subscription handler failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const UPDATE: &str =
        r#"{"MessageType":"download-update","Title":"Foo","BytesDownloaded":1,"TotalBytes":2}"#;

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn handlers_run_in_registration_order() {
        let seen = log();
        let mut dispatcher = Dispatcher::new();
        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            dispatcher.subscribe_message(MessageKind::DownloadUpdate, move |_| {
                seen.lock().unwrap().push(name.to_string());
                Ok(())
            });
        }

        let delivered = dispatcher.dispatch_frame(UPDATE);

        assert_eq!(delivered, 3);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn only_matching_kind_is_invoked() {
        let seen = log();
        let mut dispatcher = Dispatcher::new();
        let s = Arc::clone(&seen);
        dispatcher.subscribe_message(MessageKind::DownloadComplete, move |e| {
            s.lock().unwrap().push(e.title().to_string());
            Ok(())
        });

        assert_eq!(dispatcher.dispatch_frame(UPDATE), 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_handler_does_not_block_the_rest() {
        let seen = log();
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe_message(MessageKind::DownloadUpdate, |_| {
            Err(HandlerError::new("boom"))
        });
        dispatcher.subscribe_message(MessageKind::DownloadUpdate, |_| panic!("kaboom"));
        let s = Arc::clone(&seen);
        dispatcher.subscribe_message(MessageKind::DownloadUpdate, move |_| {
            s.lock().unwrap().push("ran".into());
            Ok(())
        });

        let delivered = dispatcher.dispatch_frame(UPDATE);

        assert_eq!(delivered, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["ran"]);
        assert_eq!(dispatcher.stats().handler_failures, 2);
        assert_eq!(dispatcher.stats().deliveries, 1);
    }

    #[test]
    fn malformed_frame_is_counted_and_dropped() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe_message(MessageKind::DownloadUpdate, |_| Ok(()));

        assert_eq!(dispatcher.dispatch_frame("{not json"), 0);
        assert_eq!(dispatcher.dispatch_frame(UPDATE), 1);

        let stats = dispatcher.stats();
        assert_eq!(stats.frames_received, 2);
        assert_eq!(stats.frames_malformed, 1);
        assert_eq!(stats.deliveries, 1);
    }

    #[test]
    fn unknown_kind_is_not_an_error() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe_message(MessageKind::DownloadUpdate, |_| Ok(()));

        assert_eq!(dispatcher.dispatch_frame(r#"{"MessageType":"other"}"#), 0);
        assert_eq!(dispatcher.stats().frames_unrecognized, 1);
        assert_eq!(dispatcher.stats().frames_malformed, 0);
    }

    #[test]
    fn lifecycle_routes_by_variant() {
        let seen = log();
        let mut dispatcher = Dispatcher::new();
        for event in [LifecycleEvent::Opened, LifecycleEvent::Closed] {
            let s = Arc::clone(&seen);
            dispatcher.subscribe_lifecycle(event, move |e| {
                s.lock().unwrap().push(e.to_string());
                Ok(())
            });
        }

        dispatcher.on_lifecycle(LifecycleEvent::Opened);
        dispatcher.on_lifecycle(LifecycleEvent::Errored);
        dispatcher.on_lifecycle(LifecycleEvent::Closed);

        assert_eq!(*seen.lock().unwrap(), vec!["opened", "closed"]);
    }

    #[test]
    fn message_subscribers_ignore_lifecycle() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.subscribe_message(MessageKind::DownloadStart, |_| Ok(()));
        assert_eq!(dispatcher.dispatch_lifecycle(LifecycleEvent::Opened), 0);
    }

    #[test]
    fn unsubscribe_removes_only_that_token() {
        let mut dispatcher = Dispatcher::new();
        let a = dispatcher.subscribe_message(MessageKind::DownloadUpdate, |_| Ok(()));
        let b = dispatcher.subscribe_message(MessageKind::DownloadUpdate, |_| Ok(()));

        assert!(dispatcher.unsubscribe(a));
        assert!(!dispatcher.unsubscribe(a));
        assert_eq!(dispatcher.subscription_count(), 1);
        assert_eq!(
            dispatcher.interests(),
            vec![(b, Interest::Message(MessageKind::DownloadUpdate))]
        );
        assert_eq!(dispatcher.dispatch_frame(UPDATE), 1);
    }

    #[test]
    fn duplicate_subscriptions_each_fire() {
        let count = Arc::new(Mutex::new(0));
        let mut dispatcher = Dispatcher::new();
        for _ in 0..2 {
            let c = Arc::clone(&count);
            dispatcher.subscribe_lifecycle(LifecycleEvent::Opened, move |_| {
                *c.lock().unwrap() += 1;
                Ok(())
            });
        }

        dispatcher.dispatch_lifecycle(LifecycleEvent::Opened);

        assert_eq!(*count.lock().unwrap(), 2);
    }
}
