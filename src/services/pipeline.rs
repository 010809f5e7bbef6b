//! The asynchronous processing pipeline: a bounded intake queue feeding one
//! background worker.
//!
//! Exactly one worker consumes the queue. That serializes symbol-repository
//! syncs and stack-walk invocations, so the shared symbols checkout is never
//! mutated concurrently and no locking is needed. The cost is head-of-line
//! blocking, which the per-invocation deadline bounds.
//!
//! Failures after intake are terminal for that report: the identifier is
//! logged and abandoned, never requeued. Queue contents are in-memory only
//! and lost on process exit.

use crate::models::report::ReportId;
use crate::services::report_store::ReportStore;
use std::{
    io,
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    time::Duration,
};
use thiserror::Error;
use tokio::{process::Command, sync::mpsc, time::timeout};
use tracing::{debug, error, info, warn};

/// Upper bound on reports accepted but not yet processed. Producers block
/// once this many are outstanding.
const INTAKE_QUEUE_CAPACITY: usize = 100;

/// Per-platform subdirectories of the symbols repository, passed to the
/// stack-walk tool on every invocation.
const SYMBOL_PLATFORMS: [&str; 4] = ["linux32", "linux64", "osx", "windows"];

/// Settings for the background worker.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Root of the version-controlled symbols repository.
    pub symbols_dir: PathBuf,

    /// Stack-walking binary, e.g. `minidump_stackwalk`.
    pub stackwalk_tool: PathBuf,

    /// Deadline for one stack-walk invocation. Expiry counts as tool failure.
    pub stackwalk_timeout: Duration,
}

/// The worker is gone, so the report can never be processed.
#[derive(Debug, Error)]
#[error("processing pipeline is not accepting reports")]
pub struct SubmitError;

/// Producer side of the intake queue. Cheap to clone; one per handler task.
#[derive(Clone)]
pub struct PipelineHandle {
    tx: mpsc::Sender<ReportId>,
}

impl PipelineHandle {
    /// Queue a stored report for symbolication.
    ///
    /// Waits for space when the queue is full; never drops silently.
    pub async fn submit(&self, id: ReportId) -> Result<(), SubmitError> {
        self.tx.send(id).await.map_err(|_| SubmitError)
    }
}

/// Spawn the processing worker and return the handle used to feed it.
///
/// The worker runs until every handle has been dropped; in the server binary
/// the handle lives in the shared state, so the loop runs for the process
/// lifetime.
pub fn start(store: ReportStore, config: WorkerConfig) -> PipelineHandle {
    let (tx, rx) = mpsc::channel(INTAKE_QUEUE_CAPACITY);
    tokio::spawn(worker_loop(store, config, rx));
    PipelineHandle { tx }
}

async fn worker_loop(store: ReportStore, config: WorkerConfig, mut rx: mpsc::Receiver<ReportId>) {
    let symbol_dirs: Vec<PathBuf> = SYMBOL_PLATFORMS
        .iter()
        .map(|platform| config.symbols_dir.join(platform))
        .collect();

    info!(
        "crash report worker started (symbols at {})",
        config.symbols_dir.display()
    );

    while let Some(id) = rx.recv().await {
        // Stale symbols degrade the trace but don't invalidate it.
        if let Err(err) = sync_symbols(&config.symbols_dir).await {
            warn!(
                "failed to sync symbol repository {}: {}",
                config.symbols_dir.display(),
                err
            );
        }

        match process_report(&store, &config, &symbol_dirs, &id).await {
            Ok(()) => debug!("wrote stack trace for report {}", id),
            Err(err) => error!(
                "failed to process minidump {}: {}",
                store.dump_path(&id).display(),
                err
            ),
        }
    }

    info!("crash report worker stopped: all intake handles dropped");
}

#[derive(Debug, Error)]
enum ProcessError {
    #[error("stack-walk tool could not be run: {0}")]
    Spawn(io::Error),
    #[error("stack-walk tool exceeded its {0:?} deadline")]
    Deadline(Duration),
    #[error("stack-walk tool exited with {0}")]
    ToolFailed(ExitStatus),
    #[error("could not write stack trace: {0}")]
    TraceWrite(io::Error),
}

/// Symbolicate one report and persist the trace.
async fn process_report(
    store: &ReportStore,
    config: &WorkerConfig,
    symbol_dirs: &[PathBuf],
    id: &ReportId,
) -> Result<(), ProcessError> {
    let trace = symbolicate(config, &store.dump_path(id), symbol_dirs).await?;
    store
        .write_trace(id, &trace)
        .await
        .map_err(ProcessError::TraceWrite)?;
    Ok(())
}

/// Run the stack-walk tool and capture its entire standard output.
async fn symbolicate(
    config: &WorkerConfig,
    dump_path: &Path,
    symbol_dirs: &[PathBuf],
) -> Result<Vec<u8>, ProcessError> {
    let mut command = Command::new(&config.stackwalk_tool);
    command
        .arg(dump_path)
        .args(symbol_dirs)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match timeout(config.stackwalk_timeout, command.output()).await {
        Ok(result) => result.map_err(ProcessError::Spawn)?,
        Err(_) => return Err(ProcessError::Deadline(config.stackwalk_timeout)),
    };

    if !output.status.success() {
        return Err(ProcessError::ToolFailed(output.status));
    }
    Ok(output.stdout)
}

/// Pull the latest symbols from the repository's upstream.
async fn sync_symbols(symbols_dir: &Path) -> io::Result<()> {
    let status = Command::new("git")
        .arg("-C")
        .arg(symbols_dir)
        .arg("pull")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await?;

    if !status.success() {
        return Err(io::Error::other(format!("git pull exited with {}", status)));
    }
    Ok(())
}
