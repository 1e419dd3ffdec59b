//! Recording of generator fallbacks.

use std::sync::{Mutex, PoisonError};

use crate::resolve::GeneratorInfo;

/// The host could not use the requested generator and fell back to the
/// built-in one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackEvent {
    pub requested: GeneratorInfo,
    pub reason: String,
}

/// Best-effort recorder for fallback events. Must not fail or block.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: FallbackEvent);
}

/// Logs fallback events. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: FallbackEvent) {
        tracing::debug!(
            "Fallback from generator {} at {}: {}",
            event.requested.version,
            event.requested.location.display(),
            event.reason
        );
    }
}

/// Keeps fallback events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<FallbackEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<FallbackEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&self, event: FallbackEvent) {
        tracing::debug!("Recorded fallback: {}", event.reason);
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }
}
