//! Isolated execution contexts.
//!
//! An isolated context runs one non-built-in generator version outside the
//! host's own code. The lifecycle is `create` → `initialize` → any number
//! of `invoke` calls → `release`.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use semver::Version;

use crate::error::{Error, Result};
use crate::generator::{GenerationRequest, TestGenerator};
use crate::ipc::{WorkerHandle, find_worker_binary};
use crate::resolve::GeneratorInfo;

/// One loaded generator implementation for one version.
pub trait IsolatedContext: Send + Sync {
    /// Version this context was created for.
    fn version(&self) -> &Version;

    /// Prepare the context for use. Called once, right after creation.
    fn initialize(&self) -> Result<()>;

    /// Run the generator.
    fn invoke(&self, request: &GenerationRequest) -> Result<String>;

    /// Release every resource the context holds. Must be safe to call
    /// more than once and after a failed `initialize`.
    fn release(&self);
}

/// Creates isolated contexts for generator locations.
pub trait ContextLauncher: Send + Sync {
    fn create(&self, info: &GeneratorInfo) -> Result<Box<dyn IsolatedContext>>;
}

/// [`TestGenerator`] view of an isolated context.
pub struct IsolatedGenerator {
    context: Box<dyn IsolatedContext>,
}

impl IsolatedGenerator {
    pub fn new(context: Box<dyn IsolatedContext>) -> Self {
        Self { context }
    }

    pub fn release(&self) {
        self.context.release();
    }
}

impl TestGenerator for IsolatedGenerator {
    fn version(&self) -> Version {
        self.context.version().clone()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.context.invoke(request)
    }

    fn is_isolated(&self) -> bool {
        true
    }
}

/// Launches generators as `spekgen-worker` subprocesses.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    startup_timeout: Duration,
}

impl ProcessLauncher {
    pub fn new(startup_timeout: Duration) -> Self {
        Self { startup_timeout }
    }
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl ContextLauncher for ProcessLauncher {
    fn create(&self, info: &GeneratorInfo) -> Result<Box<dyn IsolatedContext>> {
        let binary = find_worker_binary(&info.location)?;
        tracing::info!("Starting generator {} from {}", info.version, binary.display());
        let worker = WorkerHandle::spawn(&binary)?;

        Ok(Box::new(WorkerContext {
            version: info.version.clone(),
            binary,
            startup_timeout: self.startup_timeout,
            worker: Mutex::new(Some(worker)),
        }))
    }
}

/// Isolated context backed by a worker process.
///
/// Requests are serialized through the worker mutex; the worker answers
/// one request at a time over its pipes.
pub struct WorkerContext {
    version: Version,
    binary: PathBuf,
    startup_timeout: Duration,
    worker: Mutex<Option<WorkerHandle>>,
}

impl WorkerContext {
    fn with_worker<T>(&self, f: impl FnOnce(&mut WorkerHandle) -> Result<T>) -> Result<T> {
        let mut guard = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        let worker = guard
            .as_mut()
            .ok_or_else(|| Error::Ipc(format!("generator {} has been released", self.version)))?;
        if !worker.is_alive() {
            return Err(Error::Ipc(format!("generator worker {} is not running", worker.pid())));
        }
        f(worker)
    }
}

impl IsolatedContext for WorkerContext {
    fn version(&self) -> &Version {
        &self.version
    }

    fn initialize(&self) -> Result<()> {
        let reported = self.with_worker(|worker| worker.handshake(self.startup_timeout))?;
        if reported != self.version {
            return Err(Error::VersionMismatch {
                expected: self.version.clone(),
                found: reported,
            });
        }
        tracing::debug!("Generator {} ready ({})", self.version, self.binary.display());
        Ok(())
    }

    fn invoke(&self, request: &GenerationRequest) -> Result<String> {
        self.with_worker(|worker| worker.generate(request.clone()))
    }

    fn release(&self) {
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            let pid = worker.pid();
            if let Err(e) = worker.shutdown() {
                tracing::debug!("Worker {} did not shut down cleanly: {}", pid, e);
            }
            tracing::info!("Released generator {}", self.version);
        }
    }
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_without_worker_binary_fails() {
        // Only meaningful when no worker is reachable through the environment.
        if std::env::var_os(crate::ipc::WORKER_PATH_ENV).is_some()
            || which::which(crate::ipc::worker_binary_name()).is_ok()
        {
            return;
        }
        let temp = TempDir::new().unwrap();
        let info = GeneratorInfo {
            version: Version::new(0, 1, 0),
            location: temp.path().to_path_buf(),
        };
        assert!(matches!(ProcessLauncher::default().create(&info), Err(Error::Ipc(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_worker_binary_fails_initialize() {
        // A program that exits immediately never completes the handshake.
        let Ok(truth) = which::which("true") else {
            return;
        };
        let info = GeneratorInfo {
            version: Version::new(0, 1, 0),
            location: truth,
        };
        let context = ProcessLauncher::new(Duration::from_secs(2)).create(&info).unwrap();
        assert!(context.initialize().is_err());
        context.release();
        context.release();
    }
}
