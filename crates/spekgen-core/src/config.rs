//! Project and generation settings.
//!
//! Settings are read from a `spekgen.toml` file in the project folder.
//! Every table is optional; a missing file yields the defaults.
//!
//! ```toml
//! [project]
//! name = "Acme.Specs"
//! default_namespace = "Acme.Specs"
//! language = "csharp"
//! unit_test_provider = "nunit"
//!
//! [generator]
//! version = "1.0.0"
//! path = "tools/spekgen-1.0.0"
//!
//! [generation]
//! check_up_to_date = true
//! method = "file_content"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "spekgen.toml";

/// Language of the generated test code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Archive,
    RkyvSerialize, RkyvDeserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    #[serde(alias = "cs", alias = "c#")]
    CSharp,
    #[serde(alias = "visualbasic")]
    Vb,
}

impl TargetLanguage {
    /// File extension (without the dot) of generated files.
    pub fn extension(self) -> &'static str {
        match self {
            TargetLanguage::CSharp => "cs",
            TargetLanguage::Vb => "vb",
        }
    }
}

/// Unit test framework the emitted fixtures target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Archive,
    RkyvSerialize, RkyvDeserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum UnitTestProvider {
    #[default]
    NUnit,
    XUnit,
    MsTest,
}

impl UnitTestProvider {
    /// Name as written in `spekgen.toml`.
    pub fn as_str(self) -> &'static str {
        match self {
            UnitTestProvider::NUnit => "nunit",
            UnitTestProvider::XUnit => "xunit",
            UnitTestProvider::MsTest => "mstest",
        }
    }
}

/// Platform settings of the target project.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Archive,
    RkyvSerialize, RkyvDeserialize,
)]
pub struct ProjectPlatformSettings {
    #[serde(default)]
    pub language: TargetLanguage,
    #[serde(default)]
    pub unit_test_provider: UnitTestProvider,
}

/// How the authoritative up-to-date check decides freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpToDateCheckingMethod {
    /// Timestamps first, then the generator version embedded in the header.
    #[default]
    ModificationTimeAndGeneratorVersion,
    /// Fingerprint of version, feature content and output settings.
    FileContent,
}

/// Options for a single generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Skip regeneration when the existing output is still valid.
    pub check_up_to_date: bool,
    /// Strategy used by the content-based freshness check.
    #[serde(rename = "method")]
    pub up_to_date_checking_method: UpToDateCheckingMethod,
    /// Write generated code to the generated file path.
    pub write_result_to_file: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            check_up_to_date: false,
            up_to_date_checking_method: UpToDateCheckingMethod::default(),
            write_result_to_file: false,
        }
    }
}

/// The `[generator]` table: which generator version the project pins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Exact generator version.
    pub version: Option<String>,
    /// Folder containing that version's worker, relative to the project folder.
    pub path: Option<PathBuf>,
    /// Version requirement used when scanning the tools folder.
    pub requirement: Option<String>,
}

/// The `[host]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// How long an isolated generator may take to answer its handshake.
    pub startup_timeout_ms: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            startup_timeout_ms: 10_000,
        }
    }
}

impl HostConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

/// Settings of the project that owns the feature files.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    pub project_name: String,
    pub project_folder: PathBuf,
    pub default_namespace: Option<String>,
    pub platform: ProjectPlatformSettings,
    pub generator: GeneratorConfig,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            project_name: String::new(),
            project_folder: PathBuf::from("."),
            default_namespace: None,
            platform: ProjectPlatformSettings::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

impl ProjectSettings {
    /// Settings for a project folder with no configuration file.
    pub fn for_folder(project_folder: impl Into<PathBuf>) -> Self {
        Self {
            project_folder: project_folder.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectTable {
    name: Option<String>,
    default_namespace: Option<String>,
    #[serde(flatten)]
    platform: ProjectPlatformSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    project: ProjectTable,
    generator: GeneratorConfig,
    generation: GenerationSettings,
    host: HostConfig,
}

/// Everything read from `spekgen.toml`.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project: ProjectSettings,
    pub generation: GenerationSettings,
    pub host: HostConfig,
}

impl ProjectConfig {
    /// Load the configuration of a project folder.
    ///
    /// Returns defaults when the folder has no `spekgen.toml`.
    pub fn load(project_folder: &Path) -> Result<Self> {
        let path = project_folder.join(CONFIG_FILE_NAME);
        if !path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, project_folder.display());
            return Ok(Self::from_file(project_folder, ConfigFile::default()));
        }

        let text = fs::read_to_string(&path)?;
        Self::parse(project_folder, &text)
    }

    /// Parse configuration text for a project folder.
    pub fn parse(project_folder: &Path, text: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(Self::from_file(project_folder, file))
    }

    fn from_file(project_folder: &Path, file: ConfigFile) -> Self {
        let project_name = file.project.name.unwrap_or_else(|| {
            project_folder
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default()
        });
        let default_namespace = file
            .project
            .default_namespace
            .filter(|ns| !ns.trim().is_empty());

        Self {
            project: ProjectSettings {
                project_name,
                project_folder: project_folder.to_path_buf(),
                default_namespace,
                platform: file.project.platform,
                generator: file.generator,
            },
            generation: file.generation,
            host: file.host,
        }
    }
}
