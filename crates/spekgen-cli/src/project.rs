//! Project loading shared by the commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use spekgen_core::{FeatureFileInput, GenerationOrchestrator, ProjectConfig};

/// A loaded project and its orchestrator.
pub struct Project {
    pub config: ProjectConfig,
    pub orchestrator: GenerationOrchestrator,
}

impl Project {
    pub fn open(folder: &Path) -> anyhow::Result<Self> {
        let folder = folder
            .canonicalize()
            .with_context(|| format!("Project folder not found: {}", folder.display()))?;
        let config = ProjectConfig::load(&folder)?;
        tracing::debug!("Loaded project '{}' from {}", config.project.project_name, folder.display());

        let orchestrator = GenerationOrchestrator::from_config(&config);
        Ok(Self { config, orchestrator })
    }

    pub fn folder(&self) -> &Path {
        &self.config.project.project_folder
    }

    /// Input for a feature path given on the command line.
    ///
    /// The path may be relative to the current directory or absolute, but
    /// must lie inside the project folder.
    pub fn input_for(&self, feature: &Path) -> anyhow::Result<FeatureFileInput> {
        Ok(FeatureFileInput::new(self.relative_path(feature)?))
    }

    fn relative_path(&self, feature: &Path) -> anyhow::Result<PathBuf> {
        let candidate = if feature.exists() {
            feature.to_path_buf()
        } else {
            self.folder().join(feature)
        };
        let full = candidate
            .canonicalize()
            .with_context(|| format!("Feature file not found: {}", feature.display()))?;

        full.strip_prefix(self.folder())
            .map(Path::to_path_buf)
            .with_context(|| {
                format!(
                    "{} is outside the project folder {}",
                    feature.display(),
                    self.folder().display()
                )
            })
    }
}
