//! Feature file inputs.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TargetLanguage;
use crate::error::Result;
use crate::paths;

/// One feature file to generate tests for.
///
/// The feature content and the previously generated content can be
/// supplied inline (e.g. from an editor buffer); otherwise they are read
/// from disk relative to the project folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureFileInput {
    /// Path of the feature file relative to the project folder.
    pub project_relative_path: PathBuf,
    /// Feature text, if already loaded.
    pub feature_content: Option<String>,
    /// Path of the generated file relative to the project folder.
    /// Defaults to the feature path plus the language extension.
    pub generated_project_relative_path: Option<PathBuf>,
    /// Previously generated content, if already loaded.
    pub generated_content: Option<String>,
    /// Namespace to use instead of the one derived from the folder.
    pub custom_namespace: Option<String>,
}

impl FeatureFileInput {
    /// Input for a feature file on disk.
    pub fn new(project_relative_path: impl Into<PathBuf>) -> Self {
        Self {
            project_relative_path: project_relative_path.into(),
            ..Default::default()
        }
    }

    /// Input with inline feature content.
    pub fn with_content(project_relative_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            project_relative_path: project_relative_path.into(),
            feature_content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Project-relative path with `/` separators, regardless of platform.
    pub fn relative_path_string(&self) -> String {
        let raw = self.project_relative_path.to_string_lossy();
        if raw.contains('\\') {
            // Windows-style input on any host
            raw.split('\\').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/")
        } else {
            paths::to_slash(&self.project_relative_path)
        }
    }

    /// Absolute path of the feature file.
    pub fn feature_full_path(&self, project_folder: &Path) -> PathBuf {
        project_folder.join(&self.project_relative_path)
    }

    /// Absolute path of the generated file.
    pub fn generated_full_path(&self, project_folder: &Path, language: TargetLanguage) -> PathBuf {
        match &self.generated_project_relative_path {
            Some(path) => project_folder.join(path),
            None => project_folder.join(paths::generated_path_for(&self.project_relative_path, language)),
        }
    }

    /// Feature text, from the inline content or the file.
    pub fn load_feature_content(&self, project_folder: &Path) -> Result<String> {
        match &self.feature_content {
            Some(content) => Ok(content.clone()),
            None => Ok(fs::read_to_string(self.feature_full_path(project_folder))?),
        }
    }

    /// Previously generated text, from the inline content or the file.
    pub fn load_generated_content(&self, project_folder: &Path, language: TargetLanguage) -> Result<String> {
        match &self.generated_content {
            Some(content) => Ok(content.clone()),
            None => Ok(fs::read_to_string(self.generated_full_path(project_folder, language))?),
        }
    }
}
