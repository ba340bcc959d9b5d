//! Runs sync tasks through the external transfer tool.
//!
//! [`ProcessExecutor`] spawns the tool with piped output and supervises it
//! with a polling loop: every tick it checks whether the process has exited
//! and forwards whatever stdout/stderr lines arrived since the last tick to
//! the [`LogSink`]. Each stream is read by its own background reader into a
//! channel, so the supervisor only ever does non-blocking `try_recv` drains.
//! Line order is preserved within a stream, not across the two.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, Instrument};

use crate::contract::{ExecuteError, LogSink, SyncExecutor, TerminationStatus};
use crate::plan::SyncTask;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// The transfer program and the arguments that precede `sync`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTool {
    pub program: String,
    pub base_args: Vec<String>,
}

impl Default for TransferTool {
    fn default() -> Self {
        Self {
            program: "aws".to_string(),
            base_args: vec!["s3".to_string()],
        }
    }
}

impl TransferTool {
    pub fn new(program: impl Into<String>, base_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
        }
    }

    /// Same base arguments as the default tool, different program path.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// `<base_args> sync <source> <destination> --profile=<identity> --no-progress <flags>`
    pub fn command_args(&self, task: &SyncTask) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("sync".to_string());
        args.push(task.source.clone());
        args.push(task.destination.clone());
        args.push(format!("--profile={}", task.identity));
        args.push("--no-progress".to_string());
        args.extend(task.flags.iter().flat_map(|flag| flag.to_args()));
        args
    }

    /// Human-readable command line, for logs.
    pub fn command_line(&self, task: &SyncTask) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.base_args.iter().cloned());
        parts.push(format!(
            "sync {} {} --profile={} --no-progress",
            task.source, task.destination, task.identity
        ));
        parts.extend(task.flag_strings());
        parts.join(" ")
    }
}

/// Executes tasks by spawning [`TransferTool`] and streaming its output to a sink.
pub struct ProcessExecutor {
    tool: TransferTool,
    sink: Arc<dyn LogSink>,
    poll_interval: Duration,
}

impl ProcessExecutor {
    pub fn new(tool: TransferTool, sink: Arc<dyn LogSink>) -> Self {
        Self {
            tool,
            sink,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn drain_output(
        &self,
        stdout: &mut UnboundedReceiver<String>,
        stderr: &mut UnboundedReceiver<String>,
    ) {
        while let Ok(line) = stdout.try_recv() {
            self.sink.info(&line);
        }
        while let Ok(line) = stderr.try_recv() {
            self.sink.error(&line);
        }
    }
}

#[async_trait]
impl SyncExecutor for ProcessExecutor {
    /// Runs inside a `sync` span so every forwarded line carries the
    /// profile and remote it belongs to.
    async fn execute(&self, task: &SyncTask) -> Result<TerminationStatus, ExecuteError> {
        let span = info_span!("sync", profile = %task.identity, remote = %task.source);
        self.supervise(task).instrument(span).await
    }
}

impl ProcessExecutor {
    async fn supervise(&self, task: &SyncTask) -> Result<TerminationStatus, ExecuteError> {
        info!(command = %self.tool.command_line(task), "Launching sync");

        let mut child = Command::new(&self.tool.program)
            .args(self.tool.command_args(task))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                error!(
                    program = %self.tool.program,
                    error = ?source,
                    "Failed to launch transfer tool"
                );
                ExecuteError::Spawn {
                    program: self.tool.program.clone(),
                    source,
                }
            })?;

        let (stdout_tx, mut stdout_rx) = mpsc::unbounded_channel();
        let (stderr_tx, mut stderr_rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, stdout_tx));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, stderr_tx));
        }

        let exit_status = loop {
            let polled = match child.try_wait() {
                Ok(polled) => polled,
                Err(source) => {
                    for reader in &readers {
                        reader.abort();
                    }
                    return Err(ExecuteError::Wait {
                        program: self.tool.program.clone(),
                        source,
                    });
                }
            };
            self.drain_output(&mut stdout_rx, &mut stderr_rx);
            if let Some(status) = polled {
                break status;
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        // Output written just before exit may still be in the pipes.
        for reader in readers {
            if let Err(e) = reader.await {
                debug!(error = ?e, "Output reader task ended abnormally");
            }
        }
        self.drain_output(&mut stdout_rx, &mut stderr_rx);

        let status = TerminationStatus::from(exit_status);
        info!(code = ?status.code, "Sync process completed");
        Ok(status)
    }
}

/// Reads `reader` line by line until EOF, sending each line without its
/// terminator. Invalid UTF-8 is replaced rather than ending the stream.
fn forward_lines<R>(reader: R, tx: UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c: char| c == '\n' || c == '\r')
                        .to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = ?e, "Stopped reading transfer tool output");
                    break;
                }
            }
        }
    })
}

/// Forwards tool output to `tracing`: stdout at info, stderr at error.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn info(&self, line: &str) {
        info!(stream = "stdout", "{line}");
    }

    fn error(&self, line: &str) {
        error!(stream = "stderr", "{line}");
    }
}
