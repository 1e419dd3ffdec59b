//! Top-level generation API.
//!
//! [`GenerationOrchestrator`] ties the pieces together for one project:
//!
//! ```text
//! generate_test_file
//!   ├─ load feature content
//!   ├─ resolve generator version          (VersionResolver)
//!   ├─ freshness: preliminary → content   (UpToDateChecker)
//!   ├─ pick generator                     (IsolatedExecutionHost)
//!   ├─ generate body
//!   └─ wrap with header + namespace       (HeaderWriter)
//! ```
//!
//! Failures with a fallback (resolution, isolation, version detection)
//! are absorbed. Generation failures are reported in the result.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use semver::Version;
use serde::Serialize;

use crate::config::{GenerationSettings, HostConfig, ProjectConfig, ProjectSettings};
use crate::error::{Error, Result};
use crate::freshness::{Fingerprint, StandardUpToDateChecker, UpToDateChecker};
use crate::generator::{EmitContext, GenerationRequest, builtin_version};
use crate::header::{HeaderInfo, HeaderWriter, StandardHeaderWriter};
use crate::host::IsolatedExecutionHost;
use crate::input::FeatureFileInput;
use crate::ipc::panic_message;
use crate::paths;
use crate::resolve::{ChainResolver, Resolution, VersionResolver};

/// A problem reported by a failed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestGenerationError {
    pub line: Option<usize>,
    pub message: String,
}

impl From<&Error> for TestGenerationError {
    fn from(err: &Error) -> Self {
        Self {
            line: err.line(),
            message: err.to_string(),
        }
    }
}

/// Outcome of [`GenerationOrchestrator::generate_test_file`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub success: bool,
    /// `None` when the existing output is up to date, or on failure.
    pub generated_test_code: Option<String>,
    /// `None` when freshness was not evaluated.
    pub is_up_to_date: Option<bool>,
    /// Generator version recorded in the (existing or new) output.
    pub detected_version: Option<Version>,
    pub errors: Vec<TestGenerationError>,
}

impl GenerationResult {
    fn up_to_date(version: Version) -> Self {
        Self {
            success: true,
            generated_test_code: None,
            is_up_to_date: Some(true),
            detected_version: Some(version),
            errors: Vec::new(),
        }
    }

    fn generated(code: String, version: Version) -> Self {
        Self {
            success: true,
            generated_test_code: Some(code),
            is_up_to_date: Some(false),
            detected_version: Some(version),
            errors: Vec::new(),
        }
    }

    fn failed(err: &Error) -> Self {
        Self {
            success: false,
            generated_test_code: None,
            is_up_to_date: None,
            detected_version: None,
            errors: vec![err.into()],
        }
    }
}

/// Generates test files for the feature files of one project.
pub struct GenerationOrchestrator {
    project: ProjectSettings,
    resolver: Arc<dyn VersionResolver>,
    host: IsolatedExecutionHost,
    checker: Arc<dyn UpToDateChecker>,
    header: Arc<dyn HeaderWriter>,
}

impl GenerationOrchestrator {
    /// Orchestrator with the standard collaborators.
    pub fn new(project: ProjectSettings, host_config: &HostConfig) -> Self {
        Self::builder(project)
            .host(IsolatedExecutionHost::from_config(host_config))
            .build()
    }

    /// Orchestrator for a loaded `spekgen.toml`.
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self::new(config.project.clone(), &config.host)
    }

    pub fn builder(project: ProjectSettings) -> GenerationOrchestratorBuilder {
        GenerationOrchestratorBuilder {
            project,
            resolver: None,
            host: None,
            checker: None,
            header: None,
        }
    }

    pub fn project(&self) -> &ProjectSettings {
        &self.project
    }

    pub fn host(&self) -> &IsolatedExecutionHost {
        &self.host
    }

    /// Generator version the project currently resolves to.
    pub fn resolve(&self) -> Resolution {
        self.resolver.resolve(&self.project)
    }

    /// Generate the test file for `input`.
    ///
    /// Never returns an error: failures are reported through
    /// [`GenerationResult::success`] and [`GenerationResult::errors`].
    pub fn generate_test_file(&self, input: &FeatureFileInput, settings: &GenerationSettings) -> GenerationResult {
        match self.try_generate(input, settings) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("Generation of {} failed: {}", input.relative_path_string(), e);
                GenerationResult::failed(&e)
            }
        }
    }

    fn try_generate(&self, input: &FeatureFileInput, settings: &GenerationSettings) -> Result<GenerationResult> {
        let folder = &self.project.project_folder;
        let language = self.project.platform.language;
        let source_file = input.relative_path_string();

        let request = GenerationRequest {
            feature_content: input.load_feature_content(folder)?,
            context: EmitContext {
                folder_path: paths::folder_path(&source_file),
                source_file,
                platform: self.project.platform,
            },
        };
        let namespace = self.namespace(input, &request.context.source_file);
        let resolution = self.resolver.resolve(&self.project);

        if settings.check_up_to_date {
            let expected = Fingerprint::compute(
                &resolution.effective_version(builtin_version()),
                &request,
                &namespace,
            );
            if self.is_up_to_date(input, settings, &expected) {
                tracing::debug!("{} is up to date", request.context.source_file);
                return Ok(GenerationResult::up_to_date(expected.version));
            }
        }

        let generator = self.host.get_generator(&resolution);
        let generated = panic::catch_unwind(AssertUnwindSafe(|| generator.generate(&request)))
            .unwrap_or_else(|payload| {
                Err(Error::Emit(format!("generator panicked: {}", panic_message(payload.as_ref()))))
            });
        let body = match generated {
            Ok(body) => body,
            Err(e) => {
                // A dead worker must not stay cached.
                if generator.is_isolated() && matches!(e, Error::Ipc(_)) {
                    self.host.invalidate_generator(&generator);
                }
                return Err(e);
            }
        };

        let fingerprint = Fingerprint::compute(&generator.version(), &request, &namespace);
        let code = self.wrap(&body, &fingerprint, &namespace);

        if settings.write_result_to_file {
            let path = input.generated_full_path(folder, language);
            write_generated(&path, &code)?;
            tracing::info!("Wrote {}", path.display());
        }

        Ok(GenerationResult::generated(code, fingerprint.version))
    }

    fn namespace(&self, input: &FeatureFileInput, source_file: &str) -> String {
        match input.custom_namespace.as_deref().filter(|ns| !ns.trim().is_empty()) {
            Some(ns) => ns.to_string(),
            None => paths::namespace_for(self.project.default_namespace.as_deref(), source_file),
        }
    }

    fn is_up_to_date(&self, input: &FeatureFileInput, settings: &GenerationSettings, expected: &Fingerprint) -> bool {
        let folder = &self.project.project_folder;
        let language = self.project.platform.language;
        let method = settings.up_to_date_checking_method;

        let preliminary = self.checker.is_up_to_date_preliminary(
            input,
            &input.feature_full_path(folder),
            &input.generated_full_path(folder, language),
            method,
        );
        if let Some(up_to_date) = preliminary {
            return up_to_date;
        }

        match input.load_generated_content(folder, language) {
            Ok(existing) => self.checker.is_up_to_date(input, &existing, expected, method),
            Err(e) => {
                tracing::debug!("Cannot read generated file: {}", e);
                false
            }
        }
    }

    fn wrap(&self, body: &str, fingerprint: &Fingerprint, namespace: &str) -> String {
        let language = self.project.platform.language;
        let mut code = self.header.write_header(&HeaderInfo {
            fingerprint,
            namespace,
            language,
        });
        code.push_str(body);
        if !body.ends_with('\n') {
            code.push('\n');
        }
        code.push_str(&self.header.write_footer(language));
        code
    }

    /// Version of the generator that produced the existing generated file.
    ///
    /// Any failure (missing file, missing or corrupt header) yields `None`.
    pub fn detect_generated_test_version(&self, input: &FeatureFileInput) -> Option<Version> {
        let content = match input.load_generated_content(&self.project.project_folder, self.project.platform.language) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!("No generated file for {}: {}", input.relative_path_string(), e);
                return None;
            }
        };

        let detected = panic::catch_unwind(AssertUnwindSafe(|| self.header.detect_generated_test_version(&content)));
        match detected {
            Ok(Ok(version)) => Some(version),
            Ok(Err(e)) => {
                tracing::debug!("Cannot detect generator version: {}", e);
                None
            }
            Err(_) => {
                tracing::debug!("Header reader panicked");
                None
            }
        }
    }

    /// Drop the cached isolated generator. Call after any change to the
    /// project's generator configuration.
    pub fn invalidate_settings(&self) {
        self.host.invalidate();
    }

    /// Release the isolated generator, if any.
    pub fn dispose(&self) {
        self.host.dispose();
    }
}

fn write_generated(path: &Path, code: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, code)?;
    Ok(())
}

/// Builder for [`GenerationOrchestrator`] with replaceable collaborators.
pub struct GenerationOrchestratorBuilder {
    project: ProjectSettings,
    resolver: Option<Arc<dyn VersionResolver>>,
    host: Option<IsolatedExecutionHost>,
    checker: Option<Arc<dyn UpToDateChecker>>,
    header: Option<Arc<dyn HeaderWriter>>,
}

impl GenerationOrchestratorBuilder {
    pub fn resolver(mut self, resolver: impl VersionResolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn host(mut self, host: IsolatedExecutionHost) -> Self {
        self.host = Some(host);
        self
    }

    pub fn checker(mut self, checker: impl UpToDateChecker + 'static) -> Self {
        self.checker = Some(Arc::new(checker));
        self
    }

    pub fn header_writer(mut self, header: impl HeaderWriter + 'static) -> Self {
        self.header = Some(Arc::new(header));
        self
    }

    pub fn build(self) -> GenerationOrchestrator {
        let header: Arc<dyn HeaderWriter> = self.header.unwrap_or_else(|| Arc::new(StandardHeaderWriter::new()));
        let checker = self
            .checker
            .unwrap_or_else(|| Arc::new(StandardUpToDateChecker::new(Arc::clone(&header))));

        GenerationOrchestrator {
            project: self.project,
            resolver: self.resolver.unwrap_or_else(|| Arc::new(ChainResolver::standard())),
            host: self
                .host
                .unwrap_or_else(|| IsolatedExecutionHost::from_config(&HostConfig::default())),
            checker,
            header,
        }
    }
}
