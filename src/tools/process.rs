use std::ffi::OsString;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use encoding_rs::GBK;

/// How an external tool invocation ended.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    /// The process ran to completion. `code` is `None` when killed by a signal.
    Exited {
        code: Option<i32>,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The deadline passed and the process was killed.
    TimedOut { stdout: Vec<u8>, stderr: Vec<u8> },
    /// The process could not be started at all.
    LaunchFailed(String),
}

impl ToolOutcome {
    pub fn success(&self) -> bool {
        matches!(self, ToolOutcome::Exited { code: Some(0), .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ToolOutcome::TimedOut { .. })
    }

    pub fn stdout(&self) -> &[u8] {
        match self {
            ToolOutcome::Exited { stdout, .. } | ToolOutcome::TimedOut { stdout, .. } => stdout,
            ToolOutcome::LaunchFailed(_) => &[],
        }
    }

    /// Stdout and stderr decoded with [`decode_text`] and joined, for diagnostics.
    pub fn combined_text(&self) -> String {
        match self {
            ToolOutcome::Exited { stdout, stderr, .. }
            | ToolOutcome::TimedOut { stdout, stderr } => {
                let out = decode_text(stdout);
                let err = decode_text(stderr);
                format!("{}\n{}", out.trim(), err.trim()).trim().to_string()
            }
            ToolOutcome::LaunchFailed(reason) => reason.clone(),
        }
    }
}

/// Text from a tool or a downloaded file: UTF-8, else GBK, else UTF-8 with
/// invalid sequences replaced.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    match GBK.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text.into_owned(),
        None => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Seam over process spawning so tool invocations can be scripted in tests.
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[OsString], timeout: Option<Duration>) -> ToolOutcome;
}

/// Runs tools as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[OsString], timeout: Option<Duration>) -> ToolOutcome {
        let mut child = match Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => return ToolOutcome::LaunchFailed(format!("{}: {e}", program.display())),
        };

        let Some(stdout_pipe) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return ToolOutcome::LaunchFailed("stdout pipe unavailable".to_string());
        };
        let Some(stderr_pipe) = child.stderr.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return ToolOutcome::LaunchFailed("stderr pipe unavailable".to_string());
        };

        // Pipes are drained concurrently; a chatty encoder would otherwise
        // block on a full pipe and look like a hang.
        let stdout_rx = drain(stdout_pipe);
        let stderr_rx = drain(stderr_pipe);

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if timeout.is_some_and(|t| start.elapsed() > t) {
                        let _ = child.kill();
                        let _ = child.wait();
                        break None;
                    }
                    std::thread::sleep(Duration::from_millis(25));
                }
                Err(_) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
            }
        };

        // A grandchild that inherited the pipes can keep them open after
        // the kill, so the drain is only awaited briefly then.
        let killed = status.is_none();
        let stdout = collect(&stdout_rx, killed);
        let stderr = collect(&stderr_rx, killed);

        match status {
            Some(status) => ToolOutcome::Exited {
                code: status.code(),
                stdout,
                stderr,
            },
            None => ToolOutcome::TimedOut { stdout, stderr },
        }
    }
}

/// How long output is still awaited after a timed-out child was killed.
const KILLED_PIPE_GRACE: Duration = Duration::from_millis(500);

fn drain(mut pipe: impl Read + Send + 'static) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(buf);
    });
    rx
}

fn collect(rx: &Receiver<Vec<u8>>, killed: bool) -> Vec<u8> {
    if killed {
        rx.recv_timeout(KILLED_PIPE_GRACE).unwrap_or_default()
    } else {
        rx.recv().unwrap_or_default()
    }
}

/// Render a command line for logs.
pub fn display_command(program: &Path, args: &[OsString]) -> String {
    let mut parts = vec![quote(&program.to_string_lossy())];
    parts.extend(args.iter().map(|a| quote(&a.to_string_lossy())));
    parts.join(" ")
}

fn quote(s: &str) -> String {
    if s.is_empty() || s.contains(char::is_whitespace) {
        format!("\"{s}\"")
    } else {
        s.to_string()
    }
}
