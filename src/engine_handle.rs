//! Spawned engine processes and the line protocol spoken with them.
//!
//! An engine is driven through its standard streams, one command at a time:
//!
//! | Sent               | Answered with                  |
//! |--------------------|--------------------------------|
//! | `isready`          | a line containing `readyok`    |
//! | `go`               | `bestmove <token>`             |
//! | `position <token>` | a line containing `ok`         |
//!
//! [`EngineHandle::send`] returns the first line containing `ok` or `bestmove`, every other
//! line (search info, debug output...) is skipped.

use std::{
    io::{self, BufRead, BufReader, Read, Write},
    path::PathBuf,
    process::{Child, ChildStdin, Command, ExitStatus, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError},
    thread,
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, error, instrument, trace};

use crate::engine::Engine;

/// Everything that can go wrong while talking to an engine. Each one ends the current match.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("could not launch '{}': {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{engine}: {reason}")]
    Protocol { engine: String, reason: String },
    #[error("{engine}: no response to '{command}' within {timeout:?}")]
    Timeout {
        engine: String,
        command: String,
        timeout: Duration,
    },
    #[error("{engine}: could not stop process: {source}")]
    Cleanup {
        engine: String,
        #[source]
        source: io::Error,
    },
}

/// A request/response channel to one running engine.
pub trait EngineConnection {
    /// Send `command` and block until the engine answers with an `ok` or `bestmove` line.
    fn send(&mut self, command: &str) -> Result<String, EngineError>;

    /// Release the engine. Calling it again after a first call does nothing.
    fn close(&mut self) -> Result<(), EngineError>;
}

/// Creates [`EngineConnection`]s for engines.
pub trait EngineLauncher {
    type Connection: EngineConnection;

    fn launch(&self, engine: &Engine) -> Result<Self::Connection, EngineError>;
}

/// `true` for the lines that complete a command.
pub fn is_response_line(line: &str) -> bool {
    line.contains("ok") || line.contains("bestmove")
}

/// Launches engines as child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher {
    response_timeout: Option<Duration>,
    forward_stderr: bool,
}

impl ProcessLauncher {
    pub fn new(response_timeout: Option<Duration>, forward_stderr: bool) -> Self {
        Self {
            response_timeout,
            forward_stderr,
        }
    }
}

impl EngineLauncher for ProcessLauncher {
    type Connection = EngineHandle;

    fn launch(&self, engine: &Engine) -> Result<EngineHandle, EngineError> {
        EngineHandle::start(engine, self.response_timeout, self.forward_stderr)
    }
}

/// Owns one engine process.
///
/// The process is terminated and waited on by [`close`](EngineConnection::close), or on drop
/// if it was never closed.
#[derive(Debug)]
pub struct EngineHandle {
    name: String,
    child: Child,
    stdin: Option<ChildStdin>,
    lines: Receiver<String>,
    response_timeout: Option<Duration>,
    exit_status: Option<ExitStatus>,
    cleaned_up: bool,
}

impl EngineHandle {
    /// Time an engine gets to exit by itself once its input is closed, before it is killed.
    pub const EXIT_GRACE: Duration = Duration::from_millis(200);

    /// Spawn `engine` with its three standard streams piped.
    #[instrument(skip_all, fields(engine = %engine.name))]
    pub fn start(
        engine: &Engine,
        response_timeout: Option<Duration>,
        forward_stderr: bool,
    ) -> Result<EngineHandle, EngineError> {
        let mut child = Command::new(&engine.path_to_exe)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: engine.path_to_exe.clone(),
                source,
            })?;
        debug!(pid = child.id(), "engine started");

        let stdin = child.stdin.take();
        let (tx, lines) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            thread::spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let name = engine.name.clone();
            thread::spawn(move || drain_stderr(stderr, &name, forward_stderr));
        }

        Ok(EngineHandle {
            name: engine.name.clone(),
            child,
            stdin,
            lines,
            response_timeout,
            exit_status: None,
            cleaned_up: false,
        })
    }

    fn protocol_error(&self, reason: impl Into<String>) -> EngineError {
        EngineError::Protocol {
            engine: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn next_line(&self, deadline: Option<Instant>) -> Result<String, RecvTimeoutError> {
        match deadline {
            None => self.lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
            Some(deadline) => self
                .lines
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
        }
    }

    /// How the process ended, once closed.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Wait up to [`EXIT_GRACE`](Self::EXIT_GRACE) for the process to exit, then kill it.
    fn terminate(&mut self) -> io::Result<ExitStatus> {
        let deadline = Instant::now() + Self::EXIT_GRACE;
        while Instant::now() < deadline {
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            thread::sleep(Duration::from_millis(10));
        }
        match self.child.kill() {
            // exited after the last `try_wait`
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            other => other?,
        }
        debug!(engine = %self.name, "engine killed");
        self.child.wait()
    }
}

impl EngineConnection for EngineHandle {
    fn send(&mut self, command: &str) -> Result<String, EngineError> {
        trace!(engine = %self.name, ">> {command}");
        let written = match self.stdin.as_mut() {
            Some(stdin) => writeln!(stdin, "{command}")
                .and_then(|_| stdin.flush())
                .map_err(|e| format!("could not send '{command}': {e}")),
            None => Err("input stream already closed".to_owned()),
        };
        if let Err(reason) = written {
            return Err(self.protocol_error(reason));
        }

        let deadline = self.response_timeout.map(|t| Instant::now() + t);
        loop {
            match self.next_line(deadline) {
                Ok(line) => {
                    let line = line.trim();
                    trace!(engine = %self.name, "<< {line}");
                    if is_response_line(line) {
                        return Ok(line.to_owned());
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    return Err(EngineError::Timeout {
                        engine: self.name.clone(),
                        command: command.to_owned(),
                        timeout: self.response_timeout.unwrap_or_default(),
                    })
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(self.protocol_error(format!(
                        "output stream closed while waiting for '{command}'"
                    )))
                }
            }
        }
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if self.cleaned_up {
            return Ok(());
        }
        self.cleaned_up = true;
        drop(self.stdin.take());
        let status = self.terminate().map_err(|source| EngineError::Cleanup {
            engine: self.name.clone(),
            source,
        })?;
        self.exit_status = Some(status);
        debug!(engine = %self.name, %status, "engine stopped");
        Ok(())
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("{e}");
        }
    }
}

fn drain_stderr(stderr: impl Read, name: &str, forward: bool) {
    for line in BufReader::new(stderr).lines() {
        let Ok(line) = line else { break };
        if forward {
            debug!(engine = %name, "stderr: {line}");
        }
    }
}

#[cfg(test)]
mod handle_tests {
    use super::*;

    #[test]
    fn response_lines() {
        assert!(is_response_line("readyok"));
        assert!(is_response_line("ok"));
        assert!(is_response_line("bestmove 7g7f"));
        assert!(is_response_line("info string looks ok"));
        assert!(!is_response_line("info depth 3 score cp 12"));
    }

    #[test]
    fn spawn_error_for_missing_executable() {
        let engine = Engine::from_path("/nonexistent/engine_binary");
        let err = ProcessLauncher::default().launch(&engine).unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn talks_to_an_echoing_process() {
        // `cat` answers every command with the command itself
        let engine = Engine::new("cat", "cat");
        let mut handle = EngineHandle::start(&engine, Some(Duration::from_secs(5)), false).unwrap();
        assert_eq!(handle.send("readyok").unwrap(), "readyok");
        assert_eq!(handle.send("bestmove 7g7f").unwrap(), "bestmove 7g7f");
        handle.close().unwrap();
        // `cat` exits on end of input, well within the grace period
        assert!(handle.exit_status().unwrap().success());
        handle.close().unwrap();
        assert!(matches!(
            handle.send("go"),
            Err(EngineError::Protocol { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn process_ignoring_end_of_input_is_killed() {
        use std::os::unix::process::ExitStatusExt;

        let path = std::env::temp_dir().join(format!("stubborn_engine_{}", std::process::id()));
        std::fs::write(&path, "#!/bin/sh\nexec sleep 30\n").unwrap();
        std::fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(0o755))
            .unwrap();

        let engine = Engine::from_path(&path);
        // a process forked elsewhere in this test binary may briefly hold the script open
        let mut handle = (0..20)
            .find_map(|_| match EngineHandle::start(&engine, None, false) {
                Ok(handle) => Some(handle),
                Err(_) => {
                    std::thread::sleep(Duration::from_millis(50));
                    None
                }
            })
            .unwrap();
        let start = Instant::now();
        handle.close().unwrap();
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(handle.exit_status().unwrap().signal().is_some());
        std::fs::remove_file(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn times_out_on_silent_process() {
        // `tail` prints nothing until its input is closed
        let engine = Engine::new("tail", "tail");
        let mut handle =
            EngineHandle::start(&engine, Some(Duration::from_millis(50)), false).unwrap();
        let err = handle.send("go").unwrap_err();
        assert!(matches!(err, EngineError::Timeout { .. }), "{err}");
        handle.close().unwrap();
    }
}
