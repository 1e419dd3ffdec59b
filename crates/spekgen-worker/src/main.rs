//! Spekgen worker - runs one generator version in an isolated process.
//!
//! The host starts this binary from a pinned generator folder and talks
//! to it over stdin/stdout with length-prefixed rkyv messages. Logs go to
//! stderr; stdout carries only protocol frames.

use std::io;

use spekgen_core::generator::{BuiltinGenerator, TestGenerator};
use spekgen_core::ipc;

fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("SPEKGEN_WORKER_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let generator = BuiltinGenerator::new();
    tracing::debug!("Worker {} serving generator {}", std::process::id(), generator.version());

    let mut reader = io::stdin().lock();
    let mut writer = io::stdout().lock();
    ipc::serve(&mut reader, &mut writer, &generator)?;

    tracing::debug!("Worker {} exiting", std::process::id());
    Ok(())
}
