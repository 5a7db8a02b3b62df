//! Background tasks spawned by the client.

pub mod retention;

use std::time::Duration;

use tokio::task::JoinHandle;

/// How a background task ended during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskExit {
    Stopped,
    /// The task panicked or was aborted.
    Failed,
    TimedOut,
}

/// Wait up to `timeout` for a cancelled task to finish and log how it
/// ended.
pub async fn join(name: &str, handle: JoinHandle<()>, timeout: Duration) -> TaskExit {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => {
            tracing::info!(task = name, "Background task stopped");
            TaskExit::Stopped
        }
        Ok(Err(e)) => {
            tracing::error!(task = name, error = %e, "Background task failed");
            TaskExit::Failed
        }
        Err(_) => {
            tracing::warn!(task = name, "Background task did not stop in time");
            TaskExit::TimedOut
        }
    }
}
