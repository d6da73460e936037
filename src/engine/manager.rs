// ABOUTME: Run manager owning the table of runs and their process lifecycles
// ABOUTME: Renders commands, spawns them, streams output and handles cancellation

use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::{broadcast, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use super::error::{ExecutionError, Result};
use super::events::{EngineEvent, OutputChunk, OutputStream, Utf8Chunker};
use super::process;
use super::result::{RunId, RunSnapshot, RunStatus};
use crate::parser::Command;
use crate::template::{InputValues, TemplateEngine};

const READ_BUFFER_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// POSIX shell used as `<shell> -c <script>`
    pub shell: String,
    /// Time between SIGTERM and SIGKILL on cancel
    pub kill_grace: Duration,
    pub working_dir: Option<PathBuf>,
    /// Captured output kept per stream; older output is dropped first
    pub max_captured_bytes: usize,
    pub channel_capacity: usize,
    /// How long to keep reading output after the shell exits; background
    /// jobs that inherited the pipes are not waited for past this
    pub output_drain: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            kill_grace: Duration::from_secs(2),
            working_dir: None,
            max_captured_bytes: 1024 * 1024,
            channel_capacity: 256,
            output_drain: Duration::from_millis(500),
        }
    }
}

struct RunEntry {
    snapshot: RwLock<RunSnapshot>,
    latest: RwLock<Option<OutputChunk>>,
    output_tx: broadcast::Sender<OutputChunk>,
    cancel_tx: watch::Sender<bool>,
    /// Set once the process has been reaped (or never started)
    done_tx: watch::Sender<bool>,
}

impl RunEntry {
    fn new(snapshot: RunSnapshot, capacity: usize) -> Self {
        let (output_tx, _) = broadcast::channel(capacity);
        let (cancel_tx, _) = watch::channel(false);
        let (done_tx, _) = watch::channel(false);
        Self {
            snapshot: RwLock::new(snapshot),
            latest: RwLock::new(None),
            output_tx,
            cancel_tx,
            done_tx,
        }
    }

    fn is_done(&self) -> bool {
        *self.done_tx.borrow()
    }

    /// Record a spawn failure. Returns false when the run was already
    /// cancelled, which keeps its status.
    async fn fail_to_start(&self, error: String) -> bool {
        let failed = {
            let mut snapshot = self.snapshot.write().await;
            if snapshot.status == RunStatus::Pending {
                snapshot.mark_completed(RunStatus::Failed, None, Some(error));
                true
            } else {
                false
            }
        };
        self.done_tx.send_replace(true);
        failed
    }

    async fn record_output(&self, chunk: OutputChunk, max_bytes: usize) {
        {
            let mut snapshot = self.snapshot.write().await;
            // A cancelled run stops accepting output
            if snapshot.status == RunStatus::Cancelled {
                return;
            }
            let buffer = match chunk.stream {
                OutputStream::Stdout => &mut snapshot.stdout,
                OutputStream::Stderr => &mut snapshot.stderr,
            };
            buffer.push_str(&chunk.data);
            keep_tail(buffer, max_bytes);
        }
        *self.latest.write().await = Some(chunk.clone());
        // No subscribers is fine
        let _ = self.output_tx.send(chunk);
    }
}

/// Drop the oldest output so `buffer` stays within `max_bytes`
fn keep_tail(buffer: &mut String, max_bytes: usize) {
    if buffer.len() <= max_bytes {
        return;
    }
    let mut cut = buffer.len() - max_bytes;
    while !buffer.is_char_boundary(cut) {
        cut += 1;
    }
    buffer.drain(..cut);
}

/// Executes rendered commands and tracks each run by `RunId`.
///
/// Runs share nothing but this table; every run owns its child process,
/// output channel and cancellation signal.
pub struct RunManager {
    config: ExecutionConfig,
    engine: TemplateEngine,
    runs: RwLock<HashMap<RunId, Arc<RunEntry>>>,
    events: broadcast::Sender<EngineEvent>,
}

impl Default for RunManager {
    fn default() -> Self {
        Self::new(ExecutionConfig::default())
    }
}

impl RunManager {
    pub fn new(config: ExecutionConfig) -> Self {
        let (events, _) = broadcast::channel(config.channel_capacity);
        Self {
            config,
            engine: TemplateEngine::new(),
            runs: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Engine-wide status events
    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Render and launch `command`.
    ///
    /// A spawn failure is not an error here: the run exists and is `Failed`.
    pub async fn start_run(
        &self,
        template_id: &str,
        command: &Command,
        values: &InputValues,
    ) -> Result<RunId> {
        let (run_id, _) = self.start_run_subscribed(template_id, command, values).await?;
        Ok(run_id)
    }

    /// Like `start_run`, but subscribes to output before the process starts
    /// so no chunk is missed.
    #[instrument(skip_all, fields(template = %template_id, command = %command.id))]
    pub async fn start_run_subscribed(
        &self,
        template_id: &str,
        command: &Command,
        values: &InputValues,
    ) -> Result<(RunId, broadcast::Receiver<OutputChunk>)> {
        let rendered = match self.engine.render(command, values) {
            Ok(rendered) => rendered,
            Err(failure) => {
                warn!("{}", failure);
                self.publish(EngineEvent::ValidationFailed {
                    template_id: template_id.to_string(),
                    failure: failure.clone(),
                });
                return Err(failure.into());
            }
        };

        let run_id = RunId::new();
        let snapshot = RunSnapshot::new(run_id, template_id, &command.id, rendered.display());
        let entry = Arc::new(RunEntry::new(snapshot, self.config.channel_capacity));
        let output_rx = entry.output_tx.subscribe();
        self.runs.write().await.insert(run_id, Arc::clone(&entry));

        let mut child_command =
            process::build_command(&self.config.shell, &rendered, self.config.working_dir.as_deref());

        let mut child = match child_command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let error = ExecutionError::ExecutionStartError {
                    command_id: command.id.clone(),
                    message: e.to_string(),
                };
                error!("{}", error);
                if entry.fail_to_start(error.to_string()).await {
                    self.publish(EngineEvent::RunFailed {
                        run_id,
                        exit_code: None,
                        error: error.to_string(),
                    });
                }
                return Ok((run_id, output_rx));
            }
        };

        let pid = child.id();
        {
            let mut snapshot = entry.snapshot.write().await;
            if snapshot.status == RunStatus::Pending {
                snapshot.mark_started(pid);
            } else {
                snapshot.pid = pid;
            }
        }
        info!("Run {} started: {} (pid {:?})", run_id, rendered.display(), pid);
        self.publish(EngineEvent::RunStarted {
            run_id,
            template_id: template_id.to_string(),
            command_id: command.id.clone(),
        });

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tokio::spawn(supervise(
            run_id,
            entry,
            child,
            stdout,
            stderr,
            self.events.clone(),
            self.config.kill_grace,
            self.config.output_drain,
            self.config.max_captured_bytes,
        ));

        Ok((run_id, output_rx))
    }

    /// Output chunks from now on; earlier output is not replayed
    pub async fn subscribe_output(&self, run_id: RunId) -> Result<broadcast::Receiver<OutputChunk>> {
        Ok(self.entry(run_id).await?.output_tx.subscribe())
    }

    /// The most recent chunk, for subscribers that arrive late
    pub async fn latest_output(&self, run_id: RunId) -> Result<Option<OutputChunk>> {
        let entry = self.entry(run_id).await?;
        let latest = entry.latest.read().await.clone();
        Ok(latest)
    }

    pub async fn run_status(&self, run_id: RunId) -> Result<RunSnapshot> {
        let entry = self.entry(run_id).await?;
        let snapshot = entry.snapshot.read().await.clone();
        Ok(snapshot)
    }

    pub async fn list_runs(&self) -> Vec<RunSnapshot> {
        let entries: Vec<Arc<RunEntry>> = self.runs.read().await.values().cloned().collect();
        let mut snapshots = join_all(
            entries
                .iter()
                .map(|entry| async move { entry.snapshot.read().await.clone() }),
        )
        .await;
        snapshots.sort_by_key(|s| s.start_time);
        snapshots
    }

    /// Mark the run `Cancelled` now and stop its process group in the
    /// background (SIGTERM, then SIGKILL after the grace period).
    #[instrument(skip(self))]
    pub async fn cancel_run(&self, run_id: RunId) -> Result<RunSnapshot> {
        let entry = self.entry(run_id).await?;
        let snapshot = {
            let mut snapshot = entry.snapshot.write().await;
            if snapshot.is_terminal() {
                return Err(ExecutionError::RunNotActive {
                    run_id,
                    status: snapshot.status,
                });
            }
            snapshot.mark_completed(
                RunStatus::Cancelled,
                None,
                Some("cancelled by user".to_string()),
            );
            snapshot.clone()
        };

        entry.cancel_tx.send_replace(true);
        info!("Run {} cancelled", run_id);
        self.publish(EngineEvent::RunCancelled { run_id });
        Ok(snapshot)
    }

    /// Resolve once the run's process has been reaped
    pub async fn wait_run(&self, run_id: RunId) -> Result<RunSnapshot> {
        let entry = self.entry(run_id).await?;
        let mut done_rx = entry.done_tx.subscribe();
        // The sender lives in `entry`, so this only ends when done is set
        let _ = done_rx.wait_for(|done| *done).await;
        let snapshot = entry.snapshot.read().await.clone();
        Ok(snapshot)
    }

    /// Drop a finished run from the table
    pub async fn forget_run(&self, run_id: RunId) -> Result<RunSnapshot> {
        let mut runs = self.runs.write().await;
        let entry = runs
            .get(&run_id)
            .ok_or(ExecutionError::RunNotFound { run_id })?;
        if !entry.is_done() {
            return Err(ExecutionError::RunStillActive { run_id });
        }
        let snapshot = entry.snapshot.read().await.clone();
        runs.remove(&run_id);
        debug!("Forgot run {}", run_id);
        Ok(snapshot)
    }

    pub async fn active_count(&self) -> usize {
        self.runs
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_done())
            .count()
    }

    async fn entry(&self, run_id: RunId) -> Result<Arc<RunEntry>> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .cloned()
            .ok_or(ExecutionError::RunNotFound { run_id })
    }

    fn publish(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }
}

enum Outcome {
    Exited(std::io::Result<ExitStatus>),
    CancelRequested,
}

#[allow(clippy::too_many_arguments)]
async fn supervise(
    run_id: RunId,
    entry: Arc<RunEntry>,
    mut child: Child,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    events: broadcast::Sender<EngineEvent>,
    kill_grace: Duration,
    output_drain: Duration,
    max_bytes: usize,
) {
    let pumps: Vec<JoinHandle<()>> = [
        stdout.map(|r| tokio::spawn(pump(run_id, Arc::clone(&entry), r, OutputStream::Stdout, max_bytes))),
        stderr.map(|r| tokio::spawn(pump(run_id, Arc::clone(&entry), r, OutputStream::Stderr, max_bytes))),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut cancel_rx = entry.cancel_tx.subscribe();
    let outcome = tokio::select! {
        status = child.wait() => Outcome::Exited(status),
        _ = async { let _ = cancel_rx.wait_for(|cancelled| *cancelled).await; } => {
            Outcome::CancelRequested
        }
    };

    let status = match outcome {
        Outcome::Exited(status) => status,
        Outcome::CancelRequested => process::terminate(&mut child, kill_grace).await,
    };

    drain_output(run_id, pumps, output_drain).await;

    let event = {
        let mut snapshot = entry.snapshot.write().await;
        if snapshot.status == RunStatus::Cancelled {
            debug!("Run {} reaped after cancellation", run_id);
            None
        } else {
            Some(finish(run_id, &mut snapshot, status))
        }
    };

    entry.done_tx.send_replace(true);
    if let Some(event) = event {
        let _ = events.send(event);
    }
}

/// Wait for the output readers, but no longer than `limit`.
///
/// A background job started by the command (`sleep 60 &`) keeps the pipes
/// open after the shell exits. Its readers are detached so the run can
/// complete; output written after that is not captured.
async fn drain_output(run_id: RunId, pumps: Vec<JoinHandle<()>>, limit: Duration) {
    let aborts: Vec<_> = pumps.iter().map(|pump| pump.abort_handle()).collect();
    match tokio::time::timeout(limit, join_all(pumps)).await {
        Ok(results) => {
            for result in results {
                if let Err(e) = result {
                    warn!("Output reader for run {} panicked: {}", run_id, e);
                }
            }
        }
        Err(_) => {
            debug!(
                "Run {} still has open output pipes {:?} after exit, detaching readers",
                run_id, limit
            );
            for abort in aborts {
                abort.abort();
            }
        }
    }
}

fn finish(run_id: RunId, snapshot: &mut RunSnapshot, status: std::io::Result<ExitStatus>) -> EngineEvent {
    match status {
        Ok(status) if status.success() => {
            snapshot.mark_completed(RunStatus::Succeeded, Some(0), None);
            info!("Run {} succeeded", run_id);
            EngineEvent::RunSucceeded { run_id }
        }
        Ok(status) => {
            let message = process::describe_exit(&status);
            let stderr_tail = last_line(&snapshot.stderr);
            let error = match (process::is_start_failure(&status), stderr_tail) {
                // The shell ran but could not find or execute the program
                (true, tail) => ExecutionError::ExecutionStartError {
                    command_id: snapshot.command_id.clone(),
                    message: tail.unwrap_or(message),
                }
                .to_string(),
                (false, Some(line)) => format!("{}: {}", message, line),
                (false, None) => message,
            };
            snapshot.mark_completed(RunStatus::Failed, status.code(), Some(error.clone()));
            warn!("Run {} failed: {}", run_id, error);
            EngineEvent::RunFailed {
                run_id,
                exit_code: status.code(),
                error,
            }
        }
        Err(e) => {
            let error = format!("failed to wait for process: {}", e);
            snapshot.mark_completed(RunStatus::Failed, None, Some(error.clone()));
            error!("Run {}: {}", run_id, error);
            EngineEvent::RunFailed {
                run_id,
                exit_code: None,
                error,
            }
        }
    }
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

async fn pump<R>(run_id: RunId, entry: Arc<RunEntry>, mut reader: R, stream: OutputStream, max_bytes: usize)
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut decoder = Utf8Chunker::default();

    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => {
                if let Some(data) = decoder.push(&buffer[..n]) {
                    entry
                        .record_output(OutputChunk { run_id, stream, data }, max_bytes)
                        .await;
                }
            }
            Err(e) => {
                warn!("Reading {:?} of run {} failed: {}", stream, run_id, e);
                break;
            }
        }
    }

    if let Some(data) = decoder.finish() {
        entry
            .record_output(OutputChunk { run_id, stream, data }, max_bytes)
            .await;
    }
}
