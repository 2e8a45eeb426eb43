//! Launching external tools.
//!
//! Programs are executed directly with an explicit argument vector, never
//! through a shell. When output is captured, stdout and stderr share one
//! pipe which is drained while the child runs so a chatty tool can't stall
//! on a full pipe buffer.

use crate::error::DocumentError;
use std::ffi::{OsStr, OsString};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One external command, ready to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    capture_output: bool,
    timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            capture_output: false,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Collect the child's combined stdout+stderr. Without this, both are
    /// discarded.
    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    /// Kill the child if it is still running after `timeout`. `None` waits
    /// forever.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Human-readable command line, quoted the way a single-string process
    /// API would need it.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .map(|a| quote_arg(&a.to_string_lossy()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run to completion, blocking the calling thread.
    ///
    /// Returns the captured output (empty when not capturing) if the child
    /// exited with status zero. `document` only labels errors.
    pub fn run(&self, document: &Path) -> Result<Vec<u8>, DocumentError> {
        let command = self.program.display().to_string();
        debug!("run {}", self.command_line());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        hide_console_window(&mut cmd);

        let reader = if self.capture_output {
            let (reader, writer) = std::io::pipe()
                .map_err(|e| DocumentError::io("create output pipe", document, e))?;
            let writer_err = writer
                .try_clone()
                .map_err(|e| DocumentError::io("clone output pipe", document, e))?;
            cmd.stdout(writer).stderr(writer_err);
            Some(reader)
        } else {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
            None
        };

        let spawned = cmd.spawn();
        // The Command still owns our copies of the pipe's write end; the
        // reader only sees EOF once those are closed.
        drop(cmd);
        let mut child = spawned.map_err(|source| DocumentError::Spawn {
            command: command.clone(),
            document: document.to_path_buf(),
            source,
        })?;

        let (status, output) = match self.timeout {
            None => {
                let mut output = Vec::new();
                let read = match reader {
                    Some(mut r) => r.read_to_end(&mut output).map(|_| ()),
                    None => Ok(()),
                };
                // Reap before surfacing a read error so the child never
                // outlives this call.
                let status = reap(&mut child, &command, document)?;
                read.map_err(|e| DocumentError::io("read command output", document, e))?;
                (status, output)
            }
            Some(timeout) => {
                let drain = reader.map(spawn_drain);
                // On timeout the drain thread is left detached: a grandchild
                // may still hold the pipe open, and it ends on EOF regardless.
                let status = wait_with_timeout(&mut child, timeout, &command, document)?;
                (status, join_drain(drain, document)?)
            }
        };

        finish(status, output, &command, document)
    }
}

fn finish(
    status: ExitStatus,
    output: Vec<u8>,
    command: &str,
    document: &Path,
) -> Result<Vec<u8>, DocumentError> {
    if status.success() {
        Ok(output)
    } else {
        Err(DocumentError::Process {
            command: command.to_string(),
            document: document.to_path_buf(),
            status: describe_status(status),
            output: String::from_utf8_lossy(&output).into_owned(),
        })
    }
}

fn reap(child: &mut Child, command: &str, document: &Path) -> Result<ExitStatus, DocumentError> {
    child
        .wait()
        .map_err(|e| DocumentError::io(format!("wait for {command}"), document, e))
}

fn spawn_drain(mut reader: std::io::PipeReader) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_drain(
    drain: Option<JoinHandle<std::io::Result<Vec<u8>>>>,
    document: &Path,
) -> Result<Vec<u8>, DocumentError> {
    let Some(handle) = drain else {
        return Ok(Vec::new());
    };
    handle
        .join()
        .map_err(|_| {
            DocumentError::io(
                "read command output",
                document,
                std::io::Error::other("output reader thread panicked"),
            )
        })?
        .map_err(|e| DocumentError::io("read command output", document, e))
}

fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    command: &str,
    document: &Path,
) -> Result<ExitStatus, DocumentError> {
    let start = Instant::now();
    loop {
        let polled = child
            .try_wait()
            .map_err(|e| DocumentError::io(format!("wait for {command}"), document, e))?;
        if let Some(status) = polled {
            return Ok(status);
        }

        if start.elapsed() > timeout {
            warn!(
                "{command} exceeded {:?} on {}; killing",
                timeout,
                document.display()
            );
            let _ = child.kill();
            reap(child, command, document)?;
            return Err(DocumentError::Timeout {
                command: command.to_string(),
                document: document.to_path_buf(),
                timeout,
            });
        }

        std::thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn describe_status(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit code {code}"),
        (None, Some(sig)) => format!("killed by signal {sig}"),
        (None, None) => status.to_string(),
    }
}

#[cfg(not(unix))]
fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => status.to_string(),
    }
}

#[cfg(windows)]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console_window(_cmd: &mut Command) {}

/// Quote one argument so it survives as a single token: wrap in double
/// quotes when it is empty or contains whitespace or quotes, escaping
/// embedded quotes with a backslash.
pub fn quote_arg(arg: &str) -> String {
    let needs_quotes = arg.is_empty() || arg.chars().any(|c| c.is_whitespace() || c == '"');
    if !needs_quotes {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
