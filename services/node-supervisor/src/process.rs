//! Node process supervision.
//!
//! Each node runs as a foreground child process. One monitor task per node
//! forwards its output, waits for it to exit, publishes the exit, and hands
//! off to the teardown coordinator. Stopping is cooperative: a stop request
//! gives the process `stop_grace` to exit before it is killed.

use std::fmt;
use std::future;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use sealink_id::NodeName;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::logs::forward_line;
use crate::teardown::{NodeState, TeardownCoordinator};

/// How a node process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,

    /// Whether the exit status was success.
    pub success: bool,

    /// Output read or wait error, if any.
    pub error: Option<String>,

    /// Whether a stop had been requested before the exit.
    pub stop_requested: bool,
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {code}")?,
            None => f.write_str("terminated by signal")?,
        }
        if let Some(error) = &self.error {
            write!(f, " ({error})")?;
        }
        Ok(())
    }
}

/// A spawned node process and its monitor.
#[derive(Debug)]
pub struct MonitoredProcess {
    pid: Option<u32>,
    stop: watch::Sender<bool>,
    exit: watch::Receiver<Option<ProcessExit>>,
    monitor: JoinHandle<()>,
}

impl MonitoredProcess {
    /// OS process id, if still known at spawn time.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Ask the process to stop. Idempotent.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// The exit, if the process has already exited.
    pub fn exit(&self) -> Option<ProcessExit> {
        self.exit.borrow().clone()
    }

    /// Wait until the process has exited.
    ///
    /// Returns `None` only if the monitor task went away without publishing.
    pub async fn wait(&self) -> Option<ProcessExit> {
        let mut exit = self.exit.clone();
        let result = exit.wait_for(Option::is_some).await;
        result.ok().and_then(|exit| exit.clone())
    }

    /// Returns true once the monitor task has finished, teardown included.
    pub fn is_finished(&self) -> bool {
        self.monitor.is_finished()
    }
}

/// Spawns and monitors node processes.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSupervisor {
    stop_grace: Duration,
}

impl ProcessSupervisor {
    /// Create a supervisor with the given stop grace period.
    pub fn new(stop_grace: Duration) -> Self {
        Self { stop_grace }
    }

    /// Spawn `command` as the node process for `name`.
    ///
    /// Must be called from within a tokio runtime. When the process exits,
    /// for any reason, `teardown` is notified.
    pub fn spawn(
        &self,
        mut command: Command,
        name: &NodeName,
        teardown: Arc<TeardownCoordinator>,
    ) -> std::io::Result<MonitoredProcess> {
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let pid = child.id();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (exit_tx, exit_rx) = watch::channel(None);

        let monitor = tokio::spawn(monitor(
            child,
            name.clone(),
            stop_rx,
            self.stop_grace,
            exit_tx,
            teardown,
        ));

        Ok(MonitoredProcess {
            pid,
            stop: stop_tx,
            exit: exit_rx,
            monitor,
        })
    }
}

/// Longest output line forwarded. The rest of a longer line is discarded.
pub const MAX_LINE_BYTES: usize = 16 * 1024;

/// Line reader over node output.
///
/// Lines are split on `\n` and decoded lossily, so output that is not UTF-8
/// is still forwarded instead of ending the read.
struct OutputLines {
    reader: BufReader<Box<dyn AsyncRead + Send + Unpin>>,
    buf: Vec<u8>,
}

impl OutputLines {
    fn new<R: AsyncRead + Send + Unpin + 'static>(stream: R) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(stream);
        Self {
            reader: BufReader::new(reader),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at end of stream.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let mut read_any = false;

        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if !read_any {
                    return Ok(None);
                }
                break;
            }
            read_any = true;

            let newline = available.iter().position(|b| *b == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];
            let room = MAX_LINE_BYTES.saturating_sub(self.buf.len());
            self.buf.extend_from_slice(&chunk[..chunk.len().min(room)]);

            let consumed = newline.map_or(available.len(), |i| i + 1);
            self.reader.consume(consumed);
            if newline.is_some() {
                break;
            }
        }

        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

fn lines<R: AsyncRead + Send + Unpin + 'static>(stream: Option<R>) -> Option<OutputLines> {
    stream.map(OutputLines::new)
}

/// Next line from a stream, or never if the stream is closed.
async fn next_line(stream: &mut Option<OutputLines>) -> std::io::Result<Option<String>> {
    match stream {
        Some(lines) => lines.next_line().await,
        None => future::pending().await,
    }
}

/// Resolves at `deadline`, or never if there is none.
async fn kill_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

fn kill(child: &mut Child, name: &NodeName) {
    if let Err(e) = child.start_kill() {
        debug!(node = %name, error = %e, "Kill failed, process likely already exited");
    }
}

async fn monitor(
    mut child: Child,
    name: NodeName,
    mut stop: watch::Receiver<bool>,
    stop_grace: Duration,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    teardown: Arc<TeardownCoordinator>,
) {
    let mut stdout = lines(child.stdout.take());
    let mut stderr = lines(child.stderr.take());
    let mut stop_requested = false;
    let mut deadline: Option<Instant> = None;
    let mut read_error: Option<String> = None;

    let status = loop {
        let streams_open = stdout.is_some() || stderr.is_some();

        tokio::select! {
            line = next_line(&mut stdout) => match line {
                Ok(Some(line)) => forward_line(&name, &line),
                Ok(None) => stdout = None,
                Err(e) => {
                    error!(node = %name, error = %e, "Failed reading node output, killing node process");
                    read_error = Some(e.to_string());
                    stdout = None;
                    stderr = None;
                    kill(&mut child, &name);
                }
            },
            line = next_line(&mut stderr) => match line {
                Ok(Some(line)) => forward_line(&name, &line),
                Ok(None) => stderr = None,
                Err(e) => {
                    error!(node = %name, error = %e, "Failed reading node output, killing node process");
                    read_error = Some(e.to_string());
                    stdout = None;
                    stderr = None;
                    kill(&mut child, &name);
                }
            },
            status = child.wait(), if !streams_open => break status,
            _ = stop.changed(), if !stop_requested => {
                stop_requested = true;
                deadline = Some(Instant::now() + stop_grace);
                debug!(
                    node = %name,
                    grace_ms = stop_grace.as_millis() as u64,
                    "Stop requested, waiting for node process to exit"
                );
            }
            () = kill_deadline(deadline) => {
                warn!(node = %name, "Node process did not exit within grace period, killing");
                deadline = None;
                kill(&mut child, &name);
            }
        }
    };

    // A stop sent while the process was already exiting, or a delete that
    // took the process down, still counts as requested.
    let stop_requested = stop_requested
        || *stop.borrow()
        || stop.has_changed().is_err()
        || teardown.state() == NodeState::Deleting;

    let exit = match status {
        Ok(status) => ProcessExit {
            code: status.code(),
            success: status.success(),
            error: read_error,
            stop_requested,
        },
        Err(e) => ProcessExit {
            code: None,
            success: false,
            error: Some(e.to_string()),
            stop_requested,
        },
    };

    if exit.success || exit.stop_requested {
        info!(node = %name, exit = %exit, "Node process exited");
    } else {
        error!(node = %name, exit = %exit, "Node process exited with error");
    }

    exit_tx.send_replace(Some(exit.clone()));
    teardown.on_process_exit(&exit).await;
}
