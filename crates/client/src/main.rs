use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use plexsync_client::background::{self, retention};
use plexsync_client::command::{self, Command, HELP};
use plexsync_client::config::ClientConfig;
use plexsync_client::{logging, render};
use plexsync_core::progress::JobProgress;
use plexsync_realtime::{Channel, Dispatcher, LifecycleEvent, ProgressTracker};
use plexsync_search::{ApiError, DownloadResponse, MediaApi, RankedResultSet, SearchFailure, SearchRanker};

/// How long to wait for each background task during shutdown.
const TASK_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ClientConfig::from_env().context("Invalid configuration")?;
    logging::init(config.log_format);
    tracing::info!(
        api_root = %config.api_root,
        ws_root = %config.ws_root,
        search_interval_ms = config.search_interval.as_millis() as u64,
        "Loaded client configuration"
    );

    // --- Search ---
    let api = MediaApi::new(&config.api_root).context("Invalid PLEXSYNC_API_ROOT")?;
    let ranker = SearchRanker::spawn(Arc::new(api), config.search_interval);

    // --- Progress ---
    let tracker = ProgressTracker::new();
    let mut dispatcher = Dispatcher::new();
    tracker.attach(&mut dispatcher);
    for event in [
        LifecycleEvent::Opened,
        LifecycleEvent::Closed,
        LifecycleEvent::Errored,
    ] {
        dispatcher.subscribe_lifecycle(event, |event| {
            println!("[realtime] {event}");
            Ok(())
        });
    }

    let cancel = CancellationToken::new();

    // --- Realtime channel ---
    let channel = Channel::new(config.realtime_endpoint());
    tracing::info!(
        session_id = %channel.session_id(),
        endpoint = %channel.endpoint(),
        "Starting realtime channel"
    );
    let channel_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move { channel.run(&mut dispatcher, &cancel).await })
    };

    // --- Retention (opt-in) ---
    let retention_handle = config
        .completed_ttl
        .map(|ttl| tokio::spawn(retention::run(Arc::clone(&tracker), ttl, cancel.clone())));

    // --- Output ---
    let printer_handle = tokio::spawn(print_updates(
        ranker.results(),
        ranker.failures(),
        tracker.watch(),
        cancel.clone(),
    ));

    println!("{HELP}");
    let outcome = read_commands(&ranker, &tracker).await;

    // --- Shutdown ---
    tracing::info!("Shutting down");
    cancel.cancel();
    ranker.shutdown().await;

    match tokio::time::timeout(TASK_SHUTDOWN_TIMEOUT, channel_handle).await {
        Ok(Ok(end)) => tracing::info!(outcome = ?end, "Realtime channel stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Realtime channel task failed"),
        Err(_) => tracing::warn!("Realtime channel did not stop in time"),
    }
    if let Some(handle) = retention_handle {
        background::join("retention", handle, TASK_SHUTDOWN_TIMEOUT).await;
    }
    background::join("output", printer_handle, TASK_SHUTDOWN_TIMEOUT).await;

    tracing::info!("Shutdown complete");
    outcome
}

/// Read stdin lines until `/quit`, end of input, or Ctrl-C.
async fn read_commands(ranker: &SearchRanker, tracker: &ProgressTracker) -> anyhow::Result<()> {
    let mut lines = spawn_stdin_reader();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                } else {
                    tracing::info!("Received SIGINT (Ctrl-C)");
                }
                return Ok(());
            }
            line = lines.recv() => line,
        };

        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => return Err(e).context("Failed to read stdin"),
            None => {
                tracing::info!("End of input");
                return Ok(());
            }
        };

        match command::parse(&line) {
            Ok(Command::Query(query)) => ranker.set_query(query),
            Ok(Command::Download(key)) => report_action(key.clone(), false, ranker.download(key)),
            Ok(Command::Persist(key)) => {
                let known = ranker
                    .current_results()
                    .results
                    .into_iter()
                    .find(|r| r.key == key);
                match known {
                    Some(result) if !result.kind().supports_persist() => {
                        println!("Only shows can be persisted; use /download {key}");
                    }
                    _ => report_action(key.clone(), true, ranker.download_persist(key)),
                }
            }
            Ok(Command::Jobs) => print_jobs(&tracker.snapshot()),
            Ok(Command::Help) => println!("{HELP}"),
            Ok(Command::Quit) => return Ok(()),
            Err(e) => println!("{e}"),
        }
    }
}

/// Forward stdin lines from a dedicated thread.
///
/// A blocking read on a plain thread does not hold up runtime shutdown the
/// way `tokio::io::stdin` can. The thread exits once the receiver is gone.
fn spawn_stdin_reader() -> mpsc::Receiver<std::io::Result<String>> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

/// Print the outcome of a download request once it resolves.
fn report_action(
    key: String,
    persist: bool,
    handle: JoinHandle<Result<DownloadResponse, ApiError>>,
) {
    tokio::spawn(async move {
        match handle.await {
            Ok(Ok(response)) => println!("{}", response.log),
            Ok(Err(e)) => println!("Download of {key} failed: {e}"),
            Err(e) => tracing::error!(key = %key, persist, error = %e, "Download task failed"),
        }
    });
}

fn print_jobs(jobs: &[JobProgress]) {
    if jobs.is_empty() {
        println!("No downloads");
        return;
    }
    for job in jobs {
        println!("{}", render::job_line(job));
    }
}

/// Print ranked results, search failures, and progress changes as they
/// are published.
async fn print_updates(
    mut results: watch::Receiver<RankedResultSet>,
    mut failures: broadcast::Receiver<SearchFailure>,
    mut progress: watch::Receiver<Vec<JobProgress>>,
    cancel: CancellationToken,
) {
    let mut shown: Vec<JobProgress> = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                let set = results.borrow_and_update().clone();
                for line in render::result_lines(&set) {
                    println!("{line}");
                }
            }
            failure = failures.recv() => match failure {
                Ok(failure) => println!("Search for {:?} failed: {}", failure.query, failure.error),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Search failure output lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = progress.borrow_and_update().clone();
                for job in render::changed_jobs(&shown, &snapshot) {
                    println!("{}", render::job_line(job));
                }
                shown = snapshot;
            }
        }
    }
}
