//! Test generation: parsing feature files and emitting test fixtures.
//!
//! A generator turns feature text into the raw body of a test file. The
//! built-in generator is the one compiled into this crate; other versions
//! run inside isolated worker processes (see [`crate::host`]) and expose
//! the same [`TestGenerator`] interface.
//!
//! ```text
//! GenerationRequest ──► FeatureParser ──► FeatureModel ──► CodeEmitter ──► raw body
//! ```

mod emitter;
pub mod model;
mod parser;

use std::sync::LazyLock;

use rkyv::{Archive, Deserialize, Serialize};
use semver::Version;

use crate::config::ProjectPlatformSettings;
use crate::error::Result;

pub use emitter::{DotNetEmitter, to_identifier};
pub use model::FeatureModel;
pub use parser::GherkinParser;

static BUILTIN_VERSION: LazyLock<Version> = LazyLock::new(|| {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
});

/// Version of the generator compiled into this crate.
pub fn builtin_version() -> &'static Version {
    &BUILTIN_VERSION
}

/// Per-file inputs an emitter needs besides the model.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct EmitContext {
    /// Project-relative path of the feature file, `/`-separated.
    pub source_file: String,
    /// Folder path argument recorded in the feature metadata.
    pub folder_path: String,
    pub platform: ProjectPlatformSettings,
}

/// Everything a generator needs to produce a test body.
///
/// This is also the payload sent to isolated workers, so it only holds
/// plain data.
#[derive(Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub feature_content: String,
    pub context: EmitContext,
}

/// Turns feature text into a model.
pub trait FeatureParser: Send + Sync {
    fn parse(&self, source: &str) -> Result<FeatureModel>;
}

/// Turns a model into the raw test body for one test framework.
pub trait CodeEmitter: Send + Sync {
    fn emit(&self, feature: &FeatureModel, context: &EmitContext) -> Result<String>;
}

/// A generator implementation of one specific version.
pub trait TestGenerator: Send + Sync {
    /// Version written into the header of generated files.
    fn version(&self) -> Version;

    /// Produce the raw body (without header and namespace).
    fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Whether this generator runs outside the host process.
    fn is_isolated(&self) -> bool {
        false
    }
}

/// The generator compiled into this crate.
pub struct BuiltinGenerator {
    parser: Box<dyn FeatureParser>,
    emitter: Box<dyn CodeEmitter>,
}

impl Default for BuiltinGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl BuiltinGenerator {
    pub fn new() -> Self {
        Self {
            parser: Box::new(GherkinParser::new()),
            emitter: Box::new(DotNetEmitter::new()),
        }
    }

    /// Use a different parser/emitter pair.
    pub fn with_collaborators(parser: impl FeatureParser + 'static, emitter: impl CodeEmitter + 'static) -> Self {
        Self {
            parser: Box::new(parser),
            emitter: Box::new(emitter),
        }
    }
}

impl TestGenerator for BuiltinGenerator {
    fn version(&self) -> Version {
        builtin_version().clone()
    }

    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let model = self.parser.parse(&request.feature_content)?;
        tracing::debug!(
            "Parsed {}: {} scenario(s)",
            request.context.source_file,
            model.scenarios.len()
        );
        self.emitter.emit(&model, &request.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: &str) -> GenerationRequest {
        GenerationRequest {
            feature_content: content.to_string(),
            context: EmitContext {
                source_file: "Simple.feature".to_string(),
                folder_path: String::new(),
                platform: ProjectPlatformSettings::default(),
            },
        }
    }

    #[test]
    fn test_builtin_version_matches_package() {
        assert_eq!(builtin_version().to_string(), env!("CARGO_PKG_VERSION"));
        assert_eq!(&BuiltinGenerator::new().version(), builtin_version());
    }

    #[test]
    fn test_builtin_generates_body() {
        let body = BuiltinGenerator::new()
            .generate(&request("Feature: F\nScenario: S\n  Given x\n"))
            .unwrap();
        assert!(body.contains("class FFeature"));
    }

    #[test]
    fn test_builtin_propagates_parse_errors() {
        let err = BuiltinGenerator::new().generate(&request("not gherkin")).unwrap_err();
        assert!(matches!(err, crate::Error::Parse { line: Some(1), .. }));
    }
}
