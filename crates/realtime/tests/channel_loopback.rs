//! End-to-end tests for the realtime channel against a loopback
//! WebSocket server.
//!
//! Frames travel through a real tungstenite connection, the dispatcher,
//! and the progress tracker, exactly as they do in the client.

mod common;

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use plexsync_core::progress::JobState;
use plexsync_realtime::channel::ChannelError;
use plexsync_realtime::{
    Channel, Dispatcher, LifecycleEvent, MessageKind, ProgressTracker, SessionEnd,
};

use common::{
    record_lifecycle, refused_endpoint, serve_frames, serve_then_drop, serve_until_client_closes,
    text,
};

// ---------------------------------------------------------------------------
// Test: a full download lifecycle reaches the progress table
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_lifecycle_reaches_progress_table() {
    let (endpoint, server) = serve_frames(vec![
        text("PING"),
        text(r#"{"MessageType":"download-start","Title":"Foo","BytesDownloaded":0,"TotalBytes":0}"#),
        text("{oops"),
        text(r#"{"MessageType":"download-update","Title":"Foo","BytesDownloaded":5000,"TotalBytes":100000}"#),
        text(r#"{"MessageType":"library-refresh"}"#),
        text("PING"),
        text(r#"{"MessageType":"download-complete","Title":"Foo"}"#),
    ])
    .await;

    let tracker = ProgressTracker::new();
    let mut dispatcher = Dispatcher::new();
    tracker.attach(&mut dispatcher);
    let lifecycle = record_lifecycle(&mut dispatcher);

    let channel = Channel::new(endpoint);
    let end = channel.run(&mut dispatcher, &CancellationToken::new()).await;
    server.await.unwrap();

    assert_eq!(end, SessionEnd::ServerClosed);
    assert_eq!(
        *lifecycle.lock().unwrap(),
        vec![LifecycleEvent::Opened, LifecycleEvent::Closed]
    );

    let job = tracker.get("Foo").expect("Foo should be tracked");
    assert_eq!(job.state(), JobState::Complete);
    assert_eq!(job.percent(), 100.0);
    assert_eq!(job.label(), "(100%)");

    let stats = dispatcher.stats();
    assert_eq!(stats.frames_received, 5, "heartbeats are never forwarded");
    assert_eq!(stats.frames_malformed, 1);
    assert_eq!(stats.frames_unrecognized, 1);
}

// ---------------------------------------------------------------------------
// Test: heartbeats never trigger message subscriptions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeats_never_reach_subscribers() {
    let (endpoint, server) = serve_frames(vec![text("PING"), text("PING"), text("PING")]).await;

    let hits = Arc::new(Mutex::new(0u32));
    let mut dispatcher = Dispatcher::new();
    for kind in MessageKind::ALL {
        let hits = Arc::clone(&hits);
        dispatcher.subscribe_message(kind, move |_| {
            *hits.lock().unwrap() += 1;
            Ok(())
        });
    }

    Channel::new(endpoint)
        .run(&mut dispatcher, &CancellationToken::new())
        .await;
    server.await.unwrap();

    assert_eq!(*hits.lock().unwrap(), 0);
    assert_eq!(dispatcher.stats().frames_received, 0);
}

// ---------------------------------------------------------------------------
// Test: a malformed frame does not block the next valid frame
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_frame_does_not_block_next() {
    let (endpoint, server) = serve_frames(vec![
        text(r#"{"MessageType":"download-update","Title":"Bar","BytesDownloaded":"lots"}"#),
        text(r#"{"MessageType":"download-update","Title":"Bar","BytesDownloaded":1,"TotalBytes":4}"#),
    ])
    .await;

    let tracker = ProgressTracker::new();
    let mut dispatcher = Dispatcher::new();
    tracker.attach(&mut dispatcher);

    Channel::new(endpoint)
        .run(&mut dispatcher, &CancellationToken::new())
        .await;
    server.await.unwrap();

    assert_eq!(tracker.get("Bar").unwrap().percent(), 25.0);
    assert_eq!(dispatcher.stats().frames_malformed, 1);
}

// ---------------------------------------------------------------------------
// Test: connection failure surfaces only as `Errored`
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_failure_reports_errored() {
    let endpoint = refused_endpoint().await;

    let mut dispatcher = Dispatcher::new();
    let lifecycle = record_lifecycle(&mut dispatcher);

    let end = Channel::new(endpoint)
        .run(&mut dispatcher, &CancellationToken::new())
        .await;

    assert_matches!(end, SessionEnd::Failed(ChannelError::Connect(_)));
    assert_eq!(*lifecycle.lock().unwrap(), vec![LifecycleEvent::Errored]);
}

// ---------------------------------------------------------------------------
// Test: a dropped connection reports `Errored` then `Closed`
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receive_error_reports_errored_then_closed() {
    let (endpoint, server) = serve_then_drop(vec![text(
        r#"{"MessageType":"download-update","Title":"Baz","BytesDownloaded":1,"TotalBytes":2}"#,
    )])
    .await;

    let tracker = ProgressTracker::new();
    let mut dispatcher = Dispatcher::new();
    tracker.attach(&mut dispatcher);
    let lifecycle = record_lifecycle(&mut dispatcher);

    let end = Channel::new(endpoint)
        .run(&mut dispatcher, &CancellationToken::new())
        .await;
    server.await.unwrap();

    assert_matches!(end, SessionEnd::Failed(ChannelError::Receive(_)));
    assert_eq!(
        *lifecycle.lock().unwrap(),
        vec![
            LifecycleEvent::Opened,
            LifecycleEvent::Errored,
            LifecycleEvent::Closed,
        ]
    );
    assert_eq!(tracker.get("Baz").unwrap().percent(), 50.0);
}

// ---------------------------------------------------------------------------
// Test: cancellation closes the connection and emits `Closed`
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_sends_close_and_emits_closed() {
    let (endpoint, server) = serve_until_client_closes().await;

    let opened = Arc::new(Notify::new());
    let mut dispatcher = Dispatcher::new();
    let lifecycle = record_lifecycle(&mut dispatcher);
    {
        let opened = Arc::clone(&opened);
        dispatcher.subscribe_lifecycle(LifecycleEvent::Opened, move |_| {
            opened.notify_one();
            Ok(())
        });
    }

    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let end = Channel::new(endpoint).run(&mut dispatcher, &cancel).await;
            (end, dispatcher)
        })
    };

    opened.notified().await;
    cancel.cancel();

    let (end, _dispatcher) = task.await.unwrap();
    assert_eq!(end, SessionEnd::Cancelled);
    assert!(server.await.unwrap(), "server should observe a Close frame");
    assert_eq!(
        *lifecycle.lock().unwrap(),
        vec![LifecycleEvent::Opened, LifecycleEvent::Closed]
    );
}

// ---------------------------------------------------------------------------
// Test: cancelling before connect emits nothing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancelled_before_connect_is_silent() {
    let endpoint = refused_endpoint().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut dispatcher = Dispatcher::new();
    let lifecycle = record_lifecycle(&mut dispatcher);

    let end = Channel::new(endpoint).run(&mut dispatcher, &cancel).await;

    assert_eq!(end, SessionEnd::Cancelled);
    assert!(lifecycle.lock().unwrap().is_empty());
}
