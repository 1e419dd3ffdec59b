//! Integration tests for the generation pipeline.
//!
//! Covers the generated file format, namespace and folder path rules,
//! version detection and the freshness policy of the orchestrator.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use semver::Version;
use spekgen_core::config::{GeneratorConfig, TargetLanguage, UpToDateCheckingMethod};
use spekgen_core::header::HeaderInfo;
use spekgen_core::host::{ContextLauncher, IsolatedContext, IsolatedExecutionHost, ProcessLauncher};
use spekgen_core::resolve::FixedVersionResolver;
use spekgen_core::{
    Error, FeatureFileInput, Fingerprint, GenerationOrchestrator, GenerationRequest, GenerationSettings, GeneratorInfo,
    HeaderWriter, ProjectSettings, Resolution, Result, StandardHeaderWriter, UnknownReason, UpToDateChecker,
    builtin_version,
};
use tempfile::TempDir;

const SIMPLE_FEATURE: &str = "\
Feature: Addition
  In order to avoid silly mistakes
  I want to be told the sum of two numbers

Scenario: Add two numbers
  Given I have entered 50 into the calculator
  And I have entered 70 into the calculator
  When I press add
  Then the result should be 120 on the screen
";

fn project(folder: &Path, default_namespace: Option<&str>) -> ProjectSettings {
    ProjectSettings {
        default_namespace: default_namespace.map(String::from),
        ..ProjectSettings::for_folder(folder)
    }
}

fn unknown() -> FixedVersionResolver {
    FixedVersionResolver(Resolution::Unknown(UnknownReason::NotConfigured))
}

fn orchestrator(folder: &Path, default_namespace: Option<&str>) -> GenerationOrchestrator {
    GenerationOrchestrator::builder(project(folder, default_namespace))
        .resolver(unknown())
        .build()
}

fn generate(orchestrator: &GenerationOrchestrator, path: &str) -> String {
    let result = orchestrator.generate_test_file(
        &FeatureFileInput::with_content(path, SIMPLE_FEATURE),
        &GenerationSettings::default(),
    );
    assert!(result.success, "generation failed: {:?}", result.errors);
    result.generated_test_code.expect("generated code")
}

/// Second argument of the `FeatureInfo` constructor.
fn folder_path_argument(code: &str) -> String {
    let start = code.find("new Spekgen.FeatureInfo(").expect("FeatureInfo construction");
    let call = &code[start..];
    let call = &call[..call.find(';').expect("statement end")];
    let argument = call.split(',').nth(1).expect("folder path argument");
    argument.trim().trim_matches('"').to_string()
}

fn declared_namespace(code: &str) -> String {
    code.lines()
        .find_map(|line| line.strip_prefix("namespace "))
        .expect("namespace declaration")
        .trim()
        .to_string()
}

// =============================================================================
// Generated file format
// =============================================================================

#[test]
fn test_header_identifies_tool() {
    let temp = TempDir::new().unwrap();
    let code = generate(&orchestrator(temp.path(), None), "Simple.feature");
    assert!(code.contains("This code was generated by Spekgen"));
}

#[test]
fn test_designer_region_markers() {
    let temp = TempDir::new().unwrap();
    let code = generate(&orchestrator(temp.path(), None), "Simple.feature");

    let open = code.find("#region Designer generated code").expect("region start");
    let close = code.find("#endregion").expect("region end");
    assert!(open < close);
    assert!(code.find("namespace ").unwrap() > open);
}

#[test]
fn test_header_contains_generator_version() {
    let temp = TempDir::new().unwrap();
    let code = generate(&orchestrator(temp.path(), None), "Simple.feature");
    assert!(code.contains(&format!("Spekgen Generator Version:{}", builtin_version())));
}

// =============================================================================
// Namespaces and folder paths
// =============================================================================

#[test]
fn test_namespace_with_default_and_folder() {
    let temp = TempDir::new().unwrap();
    let code = generate(
        &orchestrator(temp.path(), Some("Default.TestNamespace")),
        r"Folder1\Folder2\Simple.feature",
    );
    assert_eq!(declared_namespace(&code), "Default.TestNamespace.Folder1.Folder2");
}

#[test]
fn test_namespace_with_default_at_root() {
    let temp = TempDir::new().unwrap();
    let code = generate(&orchestrator(temp.path(), Some("Default.TestNamespace")), "Simple.feature");
    assert_eq!(declared_namespace(&code), "Default.TestNamespace");
}

#[test]
fn test_namespace_fallback_at_root() {
    let temp = TempDir::new().unwrap();
    let code = generate(&orchestrator(temp.path(), None), "Simple.feature");
    assert_eq!(declared_namespace(&code), "Spekgen.GeneratedTests");
}

#[test]
fn test_namespace_without_default_in_folder() {
    let temp = TempDir::new().unwrap();
    let code = generate(&orchestrator(temp.path(), None), "Folder1/Folder2/Simple.feature");
    assert_eq!(declared_namespace(&code), "Folder1.Folder2");
}

#[test]
fn test_folder_path_argument_at_root() {
    let temp = TempDir::new().unwrap();
    let code = generate(&orchestrator(temp.path(), None), "Simple.feature");
    assert_eq!(folder_path_argument(&code), "");
}

#[test]
fn test_folder_path_argument_uses_forward_slashes() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator(temp.path(), None);
    assert_eq!(
        folder_path_argument(&generate(&orchestrator, r"Folder1\Folder2\Simple.feature")),
        "Folder1/Folder2"
    );
    assert_eq!(
        folder_path_argument(&generate(&orchestrator, "Folder1/Folder2/Simple.feature")),
        "Folder1/Folder2"
    );
}

#[test]
fn test_generate_from_file_on_disk() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("Specs")).unwrap();
    fs::write(temp.path().join("Specs/Simple.feature"), SIMPLE_FEATURE).unwrap();

    let result = orchestrator(temp.path(), Some("Acme")).generate_test_file(
        &FeatureFileInput::new("Specs/Simple.feature"),
        &GenerationSettings::default(),
    );
    assert!(result.success, "{:?}", result.errors);
    let code = result.generated_test_code.unwrap();
    assert_eq!(declared_namespace(&code), "Acme.Specs");
    assert!(code.contains("public virtual void AddTwoNumbers()"));
}

// =============================================================================
// Version detection
// =============================================================================

#[test]
fn test_detect_version_from_inline_content() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator(temp.path(), None);
    let generated = generate(&orchestrator, "Simple.feature");

    let input = FeatureFileInput {
        generated_content: Some(generated),
        ..FeatureFileInput::new("Simple.feature")
    };
    assert_eq!(
        orchestrator.detect_generated_test_version(&input).as_ref(),
        Some(builtin_version())
    );
}

#[test]
fn test_detect_version_from_generated_file() {
    let temp = TempDir::new().unwrap();
    let orchestrator = orchestrator(temp.path(), None);
    fs::write(temp.path().join("Simple.feature.cs"), generate(&orchestrator, "Simple.feature")).unwrap();

    assert_eq!(
        orchestrator
            .detect_generated_test_version(&FeatureFileInput::new("Simple.feature"))
            .as_ref(),
        Some(builtin_version())
    );
}

struct FailingHeaderWriter;

impl HeaderWriter for FailingHeaderWriter {
    fn write_header(&self, info: &HeaderInfo<'_>) -> String {
        StandardHeaderWriter::new().write_header(info)
    }

    fn write_footer(&self, language: TargetLanguage) -> String {
        StandardHeaderWriter::new().write_footer(language)
    }

    fn detect_generated_test_version(&self, _generated: &str) -> Result<Version> {
        Err(Error::Header("corrupt".into()))
    }

    fn detect_fingerprint(&self, _generated: &str) -> Result<Fingerprint> {
        Err(Error::Header("corrupt".into()))
    }
}

struct PanickingHeaderWriter;

impl HeaderWriter for PanickingHeaderWriter {
    fn write_header(&self, info: &HeaderInfo<'_>) -> String {
        StandardHeaderWriter::new().write_header(info)
    }

    fn write_footer(&self, language: TargetLanguage) -> String {
        StandardHeaderWriter::new().write_footer(language)
    }

    fn detect_generated_test_version(&self, _generated: &str) -> Result<Version> {
        panic!("header reader exploded")
    }

    fn detect_fingerprint(&self, _generated: &str) -> Result<Fingerprint> {
        panic!("header reader exploded")
    }
}

#[test]
fn test_detect_version_failure_is_none() {
    let temp = TempDir::new().unwrap();
    let input = FeatureFileInput {
        generated_content: Some("// Spekgen Generator Version:1.0.0".into()),
        ..FeatureFileInput::new("Simple.feature")
    };

    let failing = GenerationOrchestrator::builder(project(temp.path(), None))
        .resolver(unknown())
        .header_writer(FailingHeaderWriter)
        .build();
    assert_eq!(failing.detect_generated_test_version(&input), None);

    let panicking = GenerationOrchestrator::builder(project(temp.path(), None))
        .resolver(unknown())
        .header_writer(PanickingHeaderWriter)
        .build();
    assert_eq!(panicking.detect_generated_test_version(&input), None);
}

// =============================================================================
// Freshness policy
// =============================================================================

/// Checker with fixed answers that counts content checks.
struct StubChecker {
    preliminary: Option<bool>,
    content: bool,
    content_checks: Arc<AtomicUsize>,
}

impl UpToDateChecker for StubChecker {
    fn is_up_to_date_preliminary(
        &self,
        _input: &FeatureFileInput,
        _feature_path: &Path,
        _generated_path: &Path,
        _method: UpToDateCheckingMethod,
    ) -> Option<bool> {
        self.preliminary
    }

    fn is_up_to_date(
        &self,
        _input: &FeatureFileInput,
        _generated_content: &str,
        _expected: &Fingerprint,
        _method: UpToDateCheckingMethod,
    ) -> bool {
        self.content_checks.fetch_add(1, Ordering::SeqCst);
        self.content
    }
}

fn with_checker(folder: &Path, preliminary: Option<bool>, content: bool) -> (GenerationOrchestrator, Arc<AtomicUsize>) {
    let content_checks = Arc::new(AtomicUsize::new(0));
    let orchestrator = GenerationOrchestrator::builder(project(folder, None))
        .resolver(unknown())
        .checker(StubChecker {
            preliminary,
            content,
            content_checks: Arc::clone(&content_checks),
        })
        .build();
    (orchestrator, content_checks)
}

fn checked() -> GenerationSettings {
    GenerationSettings {
        check_up_to_date: true,
        ..Default::default()
    }
}

fn input_with_existing_output() -> FeatureFileInput {
    FeatureFileInput {
        generated_content: Some("// previously generated".into()),
        ..FeatureFileInput::with_content("Simple.feature", SIMPLE_FEATURE)
    }
}

#[test]
fn test_preliminary_up_to_date_skips_content_check() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, content_checks) = with_checker(temp.path(), Some(true), false);

    let result = orchestrator.generate_test_file(&input_with_existing_output(), &checked());
    assert!(result.success);
    assert_eq!(result.is_up_to_date, Some(true));
    assert_eq!(result.generated_test_code, None);
    assert_eq!(content_checks.load(Ordering::SeqCst), 0);
}

#[test]
fn test_preliminary_outdated_regenerates() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, content_checks) = with_checker(temp.path(), Some(false), true);

    let result = orchestrator.generate_test_file(&input_with_existing_output(), &checked());
    assert_eq!(result.is_up_to_date, Some(false));
    assert!(result.generated_test_code.is_some());
    assert_eq!(content_checks.load(Ordering::SeqCst), 0);
}

#[test]
fn test_content_check_up_to_date() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, content_checks) = with_checker(temp.path(), None, true);

    let result = orchestrator.generate_test_file(&input_with_existing_output(), &checked());
    assert_eq!(result.is_up_to_date, Some(true));
    assert_eq!(result.generated_test_code, None);
    assert_eq!(content_checks.load(Ordering::SeqCst), 1);
}

#[test]
fn test_content_check_outdated() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, content_checks) = with_checker(temp.path(), None, false);

    let result = orchestrator.generate_test_file(&input_with_existing_output(), &checked());
    assert_eq!(result.is_up_to_date, Some(false));
    let code = result.generated_test_code.expect("regenerated code");
    assert!(code.contains("This code was generated by Spekgen"));
    assert_eq!(content_checks.load(Ordering::SeqCst), 1);
}

#[test]
fn test_disabled_check_always_regenerates() {
    let temp = TempDir::new().unwrap();
    let (orchestrator, content_checks) = with_checker(temp.path(), Some(true), true);

    let result = orchestrator.generate_test_file(&input_with_existing_output(), &GenerationSettings::default());
    assert!(result.generated_test_code.is_some());
    assert_eq!(content_checks.load(Ordering::SeqCst), 0);
}

#[test]
fn test_second_generation_is_up_to_date() {
    for method in [
        UpToDateCheckingMethod::ModificationTimeAndGeneratorVersion,
        UpToDateCheckingMethod::FileContent,
    ] {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("Simple.feature"), SIMPLE_FEATURE).unwrap();
        let orchestrator = orchestrator(temp.path(), Some("Acme"));
        let settings = GenerationSettings {
            check_up_to_date: true,
            up_to_date_checking_method: method,
            write_result_to_file: true,
        };
        let input = FeatureFileInput::new("Simple.feature");

        let first = orchestrator.generate_test_file(&input, &settings);
        assert_eq!(first.is_up_to_date, Some(false), "{:?}", method);
        assert!(temp.path().join("Simple.feature.cs").exists());

        let second = orchestrator.generate_test_file(&input, &settings);
        assert!(second.success);
        assert_eq!(second.is_up_to_date, Some(true), "{:?}", method);
        assert_eq!(second.generated_test_code, None);
    }
}

#[test]
fn test_content_change_is_detected_by_fingerprint() {
    let temp = TempDir::new().unwrap();
    let feature = temp.path().join("Simple.feature");
    fs::write(&feature, SIMPLE_FEATURE).unwrap();
    let orchestrator = orchestrator(temp.path(), None);
    let settings = GenerationSettings {
        check_up_to_date: true,
        up_to_date_checking_method: UpToDateCheckingMethod::FileContent,
        write_result_to_file: true,
    };
    let input = FeatureFileInput::new("Simple.feature");
    orchestrator.generate_test_file(&input, &settings);

    // The content method ignores modification times.
    fs::write(&feature, SIMPLE_FEATURE.replace("120", "121")).unwrap();
    let result = orchestrator.generate_test_file(&input, &settings);
    assert_eq!(result.is_up_to_date, Some(false));
}

// =============================================================================
// Isolated generators
// =============================================================================

#[derive(Default)]
struct CountingLauncher {
    created: Arc<AtomicUsize>,
}

struct EchoContext(Version);

impl IsolatedContext for EchoContext {
    fn version(&self) -> &Version {
        &self.0
    }

    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    fn invoke(&self, request: &GenerationRequest) -> Result<String> {
        Ok(format!("// isolated body for {}\n", request.context.source_file))
    }

    fn release(&self) {}
}

impl ContextLauncher for CountingLauncher {
    fn create(&self, info: &GeneratorInfo) -> Result<Box<dyn IsolatedContext>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(EchoContext(info.version.clone())))
    }
}

fn pinned(folder: &Path, version: &str) -> ProjectSettings {
    ProjectSettings {
        generator: GeneratorConfig {
            version: Some(version.into()),
            path: Some(PathBuf::from("tools")),
            requirement: None,
        },
        ..ProjectSettings::for_folder(folder)
    }
}

#[test]
fn test_pinned_version_runs_isolated_and_is_recorded_in_header() {
    let temp = TempDir::new().unwrap();
    let launcher = CountingLauncher::default();
    let created = Arc::clone(&launcher.created);
    let orchestrator = GenerationOrchestrator::builder(pinned(temp.path(), "0.1.0"))
        .resolver(spekgen_core::resolve::ConfigVersionResolver)
        .host(IsolatedExecutionHost::new(launcher))
        .build();

    let result = orchestrator.generate_test_file(
        &FeatureFileInput::with_content("Simple.feature", SIMPLE_FEATURE),
        &GenerationSettings::default(),
    );
    let code = result.generated_test_code.unwrap();
    assert!(code.contains("// isolated body for Simple.feature"));
    assert!(code.contains("Spekgen Generator Version:0.1.0"));
    assert_eq!(result.detected_version, Some(Version::new(0, 1, 0)));

    orchestrator.generate_test_file(
        &FeatureFileInput::with_content("Other.feature", SIMPLE_FEATURE),
        &GenerationSettings::default(),
    );
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert!(orchestrator.host().has_isolated_context());
}

#[test]
fn test_invalidate_settings_clears_isolated_context() {
    let temp = TempDir::new().unwrap();
    let launcher = CountingLauncher::default();
    let created = Arc::clone(&launcher.created);
    let orchestrator = GenerationOrchestrator::builder(pinned(temp.path(), "0.1.0"))
        .resolver(spekgen_core::resolve::ConfigVersionResolver)
        .host(IsolatedExecutionHost::new(launcher))
        .build();
    let input = FeatureFileInput::with_content("Simple.feature", SIMPLE_FEATURE);

    orchestrator.generate_test_file(&input, &GenerationSettings::default());
    assert!(orchestrator.host().has_isolated_context());

    orchestrator.invalidate_settings();
    assert!(!orchestrator.host().has_isolated_context());

    orchestrator.generate_test_file(&input, &GenerationSettings::default());
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unreachable_generator_falls_back_to_builtin() {
    let temp = TempDir::new().unwrap();
    let orchestrator = GenerationOrchestrator::builder(pinned(temp.path(), "0.0.1"))
        .resolver(spekgen_core::resolve::ConfigVersionResolver)
        .host(IsolatedExecutionHost::new(ProcessLauncher::new(Duration::from_secs(2))))
        .build();

    // Either no worker binary is found or the one found reports another
    // version; both end on the built-in generator.
    let result = orchestrator.generate_test_file(
        &FeatureFileInput::with_content("Simple.feature", SIMPLE_FEATURE),
        &GenerationSettings::default(),
    );
    assert!(result.success, "{:?}", result.errors);
    assert!(
        result
            .generated_test_code
            .unwrap()
            .contains(&format!("Spekgen Generator Version:{}", builtin_version()))
    );
    assert!(!orchestrator.host().has_isolated_context());
}

#[test]
#[ignore = "Requires spekgen-worker binary"]
fn test_worker_context_generates_like_builtin() {
    let temp = TempDir::new().unwrap();
    let info = GeneratorInfo {
        version: builtin_version().clone(),
        location: temp.path().to_path_buf(),
    };
    let context = ProcessLauncher::new(Duration::from_secs(10)).create(&info).unwrap();
    context.initialize().unwrap();

    let orchestrator = orchestrator(temp.path(), None);
    let code = generate(&orchestrator, "Simple.feature");
    let request = GenerationRequest {
        feature_content: SIMPLE_FEATURE.to_string(),
        context: spekgen_core::generator::EmitContext {
            source_file: "Simple.feature".into(),
            folder_path: String::new(),
            platform: Default::default(),
        },
    };
    let body = context.invoke(&request).unwrap();
    assert!(code.contains(&body));

    context.release();
}
