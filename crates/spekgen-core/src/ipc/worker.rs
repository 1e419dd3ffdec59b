//! Generator worker process management.
//!
//! Provides `WorkerHandle` for spawning and talking to a worker process
//! that runs one pinned generator version.

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use semver::Version;

use crate::error::{Error, Result};
use crate::generator::GenerationRequest;

use super::protocol::{WorkerCommand, WorkerResponse, read_message, write_message};

/// Environment variable pointing at a worker binary.
pub const WORKER_PATH_ENV: &str = "SPEKGEN_WORKER_PATH";

/// File name of the worker binary on this platform.
pub fn worker_binary_name() -> &'static str {
    if cfg!(windows) {
        "spekgen-worker.exe"
    } else {
        "spekgen-worker"
    }
}

/// Find the worker binary for a generator installed at `location`.
///
/// Looks in the following order:
/// 1. `location` itself (a binary path) or `location/spekgen-worker`
/// 2. `SPEKGEN_WORKER_PATH` environment variable
/// 3. System PATH
///
/// Binaries found by 2 and 3 may run another version; the handshake
/// rejects them in that case.
pub fn find_worker_binary(location: &Path) -> Result<PathBuf> {
    if location.is_file() {
        return Ok(location.to_path_buf());
    }

    let candidate = location.join(worker_binary_name());
    if candidate.is_file() {
        return Ok(candidate);
    }

    if let Ok(path) = std::env::var(WORKER_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
    }

    if let Ok(path) = which::which(worker_binary_name()) {
        return Ok(path);
    }

    Err(Error::Ipc(format!(
        "Could not find {} in {}. Set {} or install the generator there.",
        worker_binary_name(),
        location.display(),
        WORKER_PATH_ENV
    )))
}

/// Handle to a worker process.
pub struct WorkerHandle {
    /// The child process.
    child: Child,
    /// Buffered stdin writer.
    stdin: BufWriter<std::process::ChildStdin>,
    /// Buffered stdout reader.
    stdout: BufReader<std::process::ChildStdout>,
    /// Whether the worker has been killed.
    killed: bool,
}

impl WorkerHandle {
    /// Spawn a worker process from a binary path.
    pub fn spawn(binary: &Path) -> Result<Self> {
        let mut child = Command::new(binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit()) // worker logs go to our stderr
            .spawn()
            .map_err(|e| {
                Error::Ipc(format!(
                    "Failed to spawn worker process '{}': {}",
                    binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Ipc("Failed to get worker stdout".to_string()))?;

        Ok(Self {
            child,
            stdin: BufWriter::new(stdin),
            stdout: BufReader::new(stdout),
            killed: false,
        })
    }

    /// Send a command to the worker.
    pub fn send_command(&mut self, cmd: &WorkerCommand) -> Result<()> {
        if self.killed {
            return Err(Error::Ipc("Worker has been killed".to_string()));
        }
        write_message(&mut self.stdin, cmd)
    }

    /// Receive a response from the worker.
    pub fn recv_response(&mut self) -> Result<WorkerResponse> {
        if self.killed {
            return Err(Error::Ipc("Worker has been killed".to_string()));
        }
        read_message(&mut self.stdout)
    }

    /// Ping the worker and ask for its generator version.
    ///
    /// The worker is killed if it does not answer both within `timeout`.
    pub fn handshake(&mut self, timeout: Duration) -> Result<Version> {
        let kill_handle = WorkerKillHandle::new(self);
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let watchdog_handle = kill_handle.clone();
        let watchdog = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                tracing::warn!("Worker {} did not answer within {:?}", watchdog_handle.pid, timeout);
                watchdog_handle.kill();
            }
        });

        let result = self.ping_and_handshake();
        let _ = done_tx.send(());
        let _ = watchdog.join();

        if kill_handle.is_killed() {
            return Err(Error::Timeout(format!("worker handshake exceeded {:?}", timeout)));
        }
        result
    }

    fn ping_and_handshake(&mut self) -> Result<Version> {
        self.send_command(&WorkerCommand::Ping)?;
        match self.recv_response()? {
            WorkerResponse::Pong => {}
            other => {
                return Err(Error::Ipc(format!("Unexpected response to ping: {:?}", other)));
            }
        }

        self.send_command(&WorkerCommand::Handshake)?;
        match self.recv_response()? {
            WorkerResponse::Ready { version } => Version::parse(&version)
                .map_err(|e| Error::Ipc(format!("Worker reported invalid version '{}': {}", version, e))),
            other => Err(Error::Ipc(format!("Unexpected response to handshake: {:?}", other))),
        }
    }

    /// Generate a test body in the worker.
    pub fn generate(&mut self, request: GenerationRequest) -> Result<String> {
        self.send_command(&WorkerCommand::Generate { request })?;

        match self.recv_response()? {
            WorkerResponse::Generated { code } => Ok(code),
            WorkerResponse::Error { message, line } => Err(match line {
                Some(line) => Error::parse_at(line as usize, message),
                None => Error::Worker(message),
            }),
            WorkerResponse::Panic { message } => {
                Err(Error::Worker(format!("generator panicked: {}", message)))
            }
            other => Err(Error::Ipc(format!(
                "Unexpected response when generating: {:?}",
                other
            ))),
        }
    }

    /// Kill the worker process immediately.
    pub fn kill(&mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }

        self.killed = true;

        // Try graceful shutdown first
        let _ = write_message(&mut self.stdin, &WorkerCommand::Shutdown);
        std::thread::sleep(Duration::from_millis(10));

        // Force kill if still running
        if let Err(e) = self.child.kill()
            && e.kind() != std::io::ErrorKind::InvalidInput
        {
            tracing::warn!("Failed to kill worker: {}", e);
        }

        // Wait to reap zombie
        let _ = self.child.wait();

        Ok(())
    }

    /// Check if the worker process is still running.
    pub fn is_alive(&mut self) -> bool {
        if self.killed {
            return false;
        }
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Get the process ID of the worker.
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Graceful shutdown - ask worker to exit cleanly.
    pub fn shutdown(mut self) -> Result<()> {
        if self.killed {
            return Ok(());
        }

        self.send_command(&WorkerCommand::Shutdown)?;
        let _ = self.recv_response();
        self.killed = true;

        match self.child.wait() {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(Error::Ipc(format!("Worker exited with status: {}", status))),
            Err(e) => Err(Error::Ipc(format!("Failed to wait for worker: {}", e))),
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // Ensure worker is killed when handle is dropped
        let _ = self.kill();
    }
}

/// Thread-safe handle for killing a worker from another thread.
#[derive(Clone)]
pub struct WorkerKillHandle {
    /// Process ID of the worker.
    pid: u32,
    /// Whether the kill has been requested.
    killed: Arc<AtomicBool>,
}

impl WorkerKillHandle {
    /// Create a kill handle for a worker.
    pub fn new(worker: &WorkerHandle) -> Self {
        Self {
            pid: worker.pid(),
            killed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Kill the worker process.
    pub fn kill(&self) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return; // Already killed
        }

        #[cfg(unix)]
        {
            // SIGKILL for immediate termination
            unsafe {
                libc::kill(self.pid as i32, libc::SIGKILL);
            }
        }

        #[cfg(not(unix))]
        {
            tracing::warn!("Cannot signal worker {} on this platform; it is killed on drop", self.pid);
        }
    }

    /// Check if kill has been requested.
    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_worker_binary_in_location() {
        let temp = TempDir::new().unwrap();
        let binary = temp.path().join(worker_binary_name());
        std::fs::write(&binary, "").unwrap();

        assert_eq!(find_worker_binary(temp.path()).unwrap(), binary);
        assert_eq!(find_worker_binary(&binary).unwrap(), binary);
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let temp = TempDir::new().unwrap();
        let result = WorkerHandle::spawn(&temp.path().join("no-such-worker"));
        assert!(matches!(result, Err(Error::Ipc(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_handshake_times_out_on_silent_process() {
        // `cat` echoes our ping back, which is not a valid response, so use
        // `sleep` which never answers.
        let Ok(sleep) = which::which("sleep") else {
            return;
        };
        let mut child = Command::new(sleep)
            .arg("30")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .unwrap();
        let mut handle = WorkerHandle {
            stdin: BufWriter::new(child.stdin.take().unwrap()),
            stdout: BufReader::new(child.stdout.take().unwrap()),
            child,
            killed: false,
        };

        let start = std::time::Instant::now();
        let result = handle.handshake(Duration::from_millis(200));
        assert!(matches!(result, Err(Error::Timeout(_))), "got {:?}", result.err());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    #[ignore = "Requires spekgen-worker binary"]
    fn test_worker_spawn_and_handshake() {
        let binary = find_worker_binary(Path::new(".")).unwrap();
        let mut worker = WorkerHandle::spawn(&binary).unwrap();
        let version = worker.handshake(Duration::from_secs(5)).unwrap();
        assert_eq!(&version, crate::generator::builtin_version());
        worker.shutdown().unwrap();
    }
}
