use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use plexsync_realtime::{Dispatcher, LifecycleEvent};

/// Start a one-shot WebSocket server that sends `frames` and then closes.
///
/// Returns the realtime endpoint URL the client should connect to.
pub async fn serve_frames(frames: Vec<Message>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        for frame in frames {
            ws.send(frame).await.expect("send frame");
        }
        let _ = ws.close(None).await;
    });

    (format!("ws://{addr}/api/ws"), handle)
}

/// Start a one-shot server that sends `frames` and then drops the TCP
/// connection without a closing handshake.
pub async fn serve_then_drop(frames: Vec<Message>) -> (String, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        for frame in frames {
            ws.send(frame).await.expect("send frame");
        }
        drop(ws);
    });

    (format!("ws://{addr}/api/ws"), handle)
}

/// Start a server that stays silent until the client hangs up.
///
/// The join handle resolves to `true` if the client sent a Close frame.
pub async fn serve_until_client_closes() -> (String, JoinHandle<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = accept_async(stream).await.expect("handshake");
        while let Some(msg) = ws.next().await {
            if let Ok(Message::Close(_)) = msg {
                return true;
            }
        }
        false
    });

    (format!("ws://{addr}/api/ws"), handle)
}

/// An endpoint on a port that nothing listens on.
pub async fn refused_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("ws://{addr}/api/ws")
}

/// Record every lifecycle event the dispatcher sees, in order.
pub fn record_lifecycle(dispatcher: &mut Dispatcher) -> Arc<Mutex<Vec<LifecycleEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    for event in [
        LifecycleEvent::Opened,
        LifecycleEvent::Closed,
        LifecycleEvent::Errored,
    ] {
        let seen = Arc::clone(&seen);
        dispatcher.subscribe_lifecycle(event, move |e| {
            seen.lock().unwrap().push(e);
            Ok(())
        });
    }
    seen
}

pub fn text(s: &str) -> Message {
    Message::Text(s.to_string())
}
