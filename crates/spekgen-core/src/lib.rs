//! Core engine for Spekgen test generation.
//!
//! This crate provides:
//! - Generator version resolution per project
//! - Isolated execution of pinned generator versions in worker processes,
//!   with fallback to the built-in generator
//! - Two-phase freshness checks for generated files
//! - The generation pipeline (feature parsing, test emission, headers,
//!   namespaces)

pub mod config;
pub mod error;
pub mod freshness;
pub mod generator;
pub mod header;
pub mod host;
pub mod input;
pub mod ipc;
pub mod orchestrator;
pub mod paths;
pub mod resolve;

pub use config::{
    GenerationSettings, HostConfig, ProjectConfig, ProjectPlatformSettings, ProjectSettings, TargetLanguage,
    UnitTestProvider, UpToDateCheckingMethod,
};
pub use error::{Error, Result};
pub use freshness::{Fingerprint, StandardUpToDateChecker, UpToDateChecker};
pub use generator::{BuiltinGenerator, GenerationRequest, TestGenerator, builtin_version};
pub use header::{HeaderWriter, StandardHeaderWriter};
pub use host::{ContextLauncher, IsolatedContext, IsolatedExecutionHost, ProcessLauncher};
pub use input::FeatureFileInput;
pub use orchestrator::{GenerationOrchestrator, GenerationResult, TestGenerationError};
pub use resolve::{ChainResolver, GeneratorInfo, Resolution, UnknownReason, VersionResolver};
