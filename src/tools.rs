//! External tool plumbing: process execution with deadlines, executable
//! discovery and the `ffmpeg`/`ffprobe` facade.
//!
//! Every component receives its tools through [`MediaTools`] or a
//! [`CommandRunner`] reference instead of looking them up globally.

mod discovery;
mod media;
mod process;

pub use discovery::{find_decryptor, find_executable};
pub use media::{MediaTools, ToolPaths, input_arg};
pub use process::{CommandRunner, SystemRunner, ToolOutcome, decode_text, display_command};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} timed out")]
    Timeout { tool: &'static str },

    #[error("{tool} failed (exit {code:?}): {output}")]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        output: String,
    },

    #[error("{tool} could not be started: {reason}")]
    Launch { tool: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn from_outcome(tool: &'static str, outcome: &ToolOutcome) -> Self {
        match outcome {
            ToolOutcome::TimedOut { .. } => ToolError::Timeout { tool },
            ToolOutcome::LaunchFailed(reason) => ToolError::Launch {
                tool,
                reason: reason.clone(),
            },
            ToolOutcome::Exited { code, .. } => ToolError::Failed {
                tool,
                code: *code,
                output: outcome.combined_text(),
            },
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! Scripted stand-in for external tools.

    use std::cell::RefCell;
    use std::ffi::OsString;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::{CommandRunner, ToolOutcome};

    type Handler = Box<dyn Fn(&Path, &[String]) -> ToolOutcome>;

    /// Records every invocation and answers with a caller-provided handler.
    pub struct ScriptedRunner {
        handler: Handler,
        calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
    }

    impl ScriptedRunner {
        pub fn new(handler: impl Fn(&Path, &[String]) -> ToolOutcome + 'static) -> Self {
            Self {
                handler: Box::new(handler),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(PathBuf, Vec<String>)> {
            self.calls.borrow().clone()
        }

        /// Invocations whose program file name equals `tool`.
        pub fn calls_to(&self, tool: &str) -> Vec<Vec<String>> {
            self.calls
                .borrow()
                .iter()
                .filter(|(p, _)| p.file_name().is_some_and(|n| n == tool))
                .map(|(_, a)| a.clone())
                .collect()
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(
            &self,
            program: &Path,
            args: &[OsString],
            _timeout: Option<Duration>,
        ) -> ToolOutcome {
            let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
            self.calls.borrow_mut().push((program.to_path_buf(), args.clone()));
            (self.handler)(program, &args)
        }
    }

    pub fn ok(stdout: &[u8]) -> ToolOutcome {
        ToolOutcome::Exited {
            code: Some(0),
            stdout: stdout.to_vec(),
            stderr: Vec::new(),
        }
    }

    pub fn fail(stderr: &str) -> ToolOutcome {
        ToolOutcome::Exited {
            code: Some(1),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    pub fn timed_out() -> ToolOutcome {
        ToolOutcome::TimedOut {
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    pub fn tool_paths() -> super::ToolPaths {
        super::ToolPaths {
            ffmpeg: PathBuf::from("/fake/bin/ffmpeg"),
            ffprobe: PathBuf::from("/fake/bin/ffprobe"),
        }
    }

    /// The last argument of a tool call (the output or input path).
    pub fn last_arg(args: &[String]) -> &str {
        args.last().map(String::as_str).unwrap_or("")
    }
}
