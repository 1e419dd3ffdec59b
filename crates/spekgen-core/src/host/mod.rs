//! Selection and caching of the generator used for a project.
//!
//! The host hands out the built-in generator unless the project resolved
//! to a different version. Non-built-in versions are loaded into an
//! isolated context once and reused until the host is invalidated.
//!
//! The cached context is reused without looking at the resolution again:
//! a project that changes its pinned generator must call
//! [`IsolatedExecutionHost::invalidate`].

mod context;
mod diagnostics;

use std::sync::{Arc, Mutex, PoisonError};

use semver::Version;

use crate::config::HostConfig;
use crate::error::Result;
use crate::generator::{BuiltinGenerator, TestGenerator};
use crate::resolve::{GeneratorInfo, Resolution};

pub use context::{ContextLauncher, IsolatedContext, IsolatedGenerator, ProcessLauncher, WorkerContext};
pub use diagnostics::{DiagnosticsSink, FallbackEvent, MemorySink, TracingSink};

/// Holds at most one isolated generator.
#[derive(Default)]
pub struct ContextCache {
    slot: Mutex<Option<Arc<IsolatedGenerator>>>,
}

impl ContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached generator, or the result of `create`.
    ///
    /// `create` runs under the cache lock, so concurrent first calls
    /// create a single context. A `None` from `create` is not cached.
    pub fn get_or_create<F>(&self, create: F) -> Option<Arc<IsolatedGenerator>>
    where
        F: FnOnce() -> Option<Arc<IsolatedGenerator>>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = slot.as_ref() {
            return Some(Arc::clone(cached));
        }
        let created = create()?;
        *slot = Some(Arc::clone(&created));
        Some(created)
    }

    /// Drop and release the cached generator. Returns whether one was cached.
    pub fn invalidate(&self) -> bool {
        let cached = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match cached {
            Some(generator) => {
                generator.release();
                true
            }
            None => false,
        }
    }

    /// Like [`invalidate`](Self::invalidate), but only when `generator` is
    /// the cached one. A context created after `generator` was handed out
    /// stays cached.
    pub fn invalidate_if(&self, generator: &Arc<dyn TestGenerator>) -> bool {
        let cached = {
            let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
            let same = slot
                .as_ref()
                .is_some_and(|cached| std::ptr::addr_eq(Arc::as_ptr(cached), Arc::as_ptr(generator)));
            if same { slot.take() } else { None }
        };
        match cached {
            Some(generator) => {
                generator.release();
                true
            }
            None => false,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

/// Chooses between the built-in generator and an isolated one.
pub struct IsolatedExecutionHost {
    builtin: Arc<dyn TestGenerator>,
    builtin_version: Version,
    launcher: Box<dyn ContextLauncher>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    cache: ContextCache,
}

impl IsolatedExecutionHost {
    /// Host with the built-in generator and the given launcher.
    pub fn new(launcher: impl ContextLauncher + 'static) -> Self {
        Self::with_builtin(Arc::new(BuiltinGenerator::new()), launcher)
    }

    /// Host launching worker processes with the configured startup timeout.
    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(ProcessLauncher::new(config.startup_timeout()))
    }

    pub fn with_builtin(builtin: Arc<dyn TestGenerator>, launcher: impl ContextLauncher + 'static) -> Self {
        let builtin_version = builtin.version();
        Self {
            builtin,
            builtin_version,
            launcher: Box::new(launcher),
            diagnostics: Arc::new(TracingSink),
            cache: ContextCache::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn builtin(&self) -> Arc<dyn TestGenerator> {
        Arc::clone(&self.builtin)
    }

    /// Generator to use for `resolution`.
    ///
    /// Never fails: any problem creating the isolated context is recorded
    /// and answered with the built-in generator.
    pub fn get_generator(&self, resolution: &Resolution) -> Arc<dyn TestGenerator> {
        let isolated = self.cache.get_or_create(|| {
            let info = match resolution {
                Resolution::Resolved(info) => info,
                Resolution::Unknown(reason) => {
                    tracing::debug!("Generator version unknown ({}), using built-in", reason);
                    return None;
                }
            };
            if info.version == self.builtin_version {
                tracing::debug!("Resolved generator {} is built in", info.version);
                return None;
            }
            match self.create_context(info) {
                Ok(generator) => Some(Arc::new(generator)),
                Err(e) => {
                    tracing::warn!("Generator {} unavailable, using built-in generator: {}", info.version, e);
                    self.diagnostics.record(FallbackEvent {
                        requested: info.clone(),
                        reason: e.to_string(),
                    });
                    None
                }
            }
        });

        match isolated {
            Some(generator) => generator as Arc<dyn TestGenerator>,
            None => Arc::clone(&self.builtin),
        }
    }

    fn create_context(&self, info: &GeneratorInfo) -> Result<IsolatedGenerator> {
        let context = self.launcher.create(info)?;
        if let Err(e) = context.initialize() {
            context.release();
            return Err(e);
        }
        tracing::info!("Loaded generator {} in isolated context", info.version);
        Ok(IsolatedGenerator::new(context))
    }

    /// Forget the cached context. The next call resolves afresh.
    pub fn invalidate(&self) {
        if self.cache.invalidate() {
            tracing::debug!("Isolated generator released");
        }
    }

    /// Forget the cached context if it is `generator`, e.g. after its
    /// worker died mid-request.
    pub fn invalidate_generator(&self, generator: &Arc<dyn TestGenerator>) {
        if self.cache.invalidate_if(generator) {
            tracing::debug!("Isolated generator {} released", generator.version());
        }
    }

    pub fn has_isolated_context(&self) -> bool {
        self.cache.is_cached()
    }

    /// Release everything. Safe to call repeatedly.
    pub fn dispose(&self) {
        self.invalidate();
    }
}

impl Drop for IsolatedExecutionHost {
    fn drop(&mut self) {
        self.dispose();
    }
}
