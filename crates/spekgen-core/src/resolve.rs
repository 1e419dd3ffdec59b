//! Generator version resolution.
//!
//! A project can pin the generator version its files are generated with.
//! Resolvers look that pin up; they never fail. When nothing usable is
//! found they answer [`Resolution::Unknown`] with a reason, and callers
//! use the built-in generator.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use semver::{Version, VersionReq};

use crate::config::ProjectSettings;
use crate::ipc::worker_binary_name;
use crate::paths::TOOLS_DIR;

/// Version and location of a generator implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorInfo {
    pub version: Version,
    /// Folder containing the generator's worker binary.
    pub location: PathBuf,
}

/// Why no generator could be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    /// The project does not pin a generator.
    NotConfigured,
    /// A version is pinned but no location (or vice versa).
    Incomplete(String),
    /// The pinned version string is not a valid version.
    InvalidVersion(String),
    /// The lookup itself failed (e.g. unreadable tools folder).
    LookupFailed(String),
    /// No installed generator satisfies the requirement.
    NoMatch(String),
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::NotConfigured => write!(f, "no generator configured"),
            UnknownReason::Incomplete(what) => write!(f, "incomplete generator configuration: {}", what),
            UnknownReason::InvalidVersion(v) => write!(f, "invalid generator version '{}'", v),
            UnknownReason::LookupFailed(e) => write!(f, "generator lookup failed: {}", e),
            UnknownReason::NoMatch(req) => write!(f, "no installed generator matches '{}'", req),
        }
    }
}

/// Outcome of a version lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(GeneratorInfo),
    Unknown(UnknownReason),
}

impl Resolution {
    pub fn info(&self) -> Option<&GeneratorInfo> {
        match self {
            Resolution::Resolved(info) => Some(info),
            Resolution::Unknown(_) => None,
        }
    }

    /// Version the selected generator will report.
    pub fn effective_version(&self, builtin: &Version) -> Version {
        self.info().map(|i| i.version.clone()).unwrap_or_else(|| builtin.clone())
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Resolved(info) => write!(f, "{} at {}", info.version, info.location.display()),
            Resolution::Unknown(reason) => write!(f, "unknown ({})", reason),
        }
    }
}

/// Determines the generator a project needs.
pub trait VersionResolver: Send + Sync {
    fn resolve(&self, project: &ProjectSettings) -> Resolution;
}

/// Resolver backed by the `[generator]` table of `spekgen.toml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigVersionResolver;

impl VersionResolver for ConfigVersionResolver {
    fn resolve(&self, project: &ProjectSettings) -> Resolution {
        let generator = &project.generator;
        let (version, path) = match (&generator.version, &generator.path) {
            (None, None) => return Resolution::Unknown(UnknownReason::NotConfigured),
            (Some(_), None) => return Resolution::Unknown(UnknownReason::Incomplete("missing path".into())),
            (None, Some(_)) => return Resolution::Unknown(UnknownReason::Incomplete("missing version".into())),
            (Some(version), Some(path)) => (version, path),
        };

        match Version::parse(version.trim()) {
            Ok(version) => Resolution::Resolved(GeneratorInfo {
                version,
                location: project.project_folder.join(path),
            }),
            Err(_) => Resolution::Unknown(UnknownReason::InvalidVersion(version.clone())),
        }
    }
}

/// Resolver scanning `<project>/.spekgen/generators/<version>/`.
///
/// Picks the highest installed version matching the project's
/// `generator.requirement` (any version when unset). Only folders that
/// contain a worker binary count as installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ToolsFolderResolver;

impl VersionResolver for ToolsFolderResolver {
    fn resolve(&self, project: &ProjectSettings) -> Resolution {
        let requirement = match &project.generator.requirement {
            Some(req) => match VersionReq::parse(req) {
                Ok(req) => req,
                Err(_) => return Resolution::Unknown(UnknownReason::InvalidVersion(req.clone())),
            },
            None => VersionReq::STAR,
        };

        let tools_dir = project.project_folder.join(TOOLS_DIR);
        if !tools_dir.is_dir() {
            return Resolution::Unknown(UnknownReason::NotConfigured);
        }

        let entries = match fs::read_dir(&tools_dir) {
            Ok(entries) => entries,
            Err(e) => return Resolution::Unknown(UnknownReason::LookupFailed(e.to_string())),
        };

        let best = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let version = Version::parse(&entry.file_name().to_string_lossy()).ok()?;
                let location = entry.path();
                location
                    .join(worker_binary_name())
                    .exists()
                    .then_some(GeneratorInfo { version, location })
            })
            .filter(|info| requirement.matches(&info.version))
            .max_by(|a, b| a.version.cmp(&b.version));

        match best {
            Some(info) => Resolution::Resolved(info),
            None => Resolution::Unknown(UnknownReason::NoMatch(requirement.to_string())),
        }
    }
}

/// Resolver returning a fixed answer.
#[derive(Debug, Clone)]
pub struct FixedVersionResolver(pub Resolution);

impl VersionResolver for FixedVersionResolver {
    fn resolve(&self, _project: &ProjectSettings) -> Resolution {
        self.0.clone()
    }
}

/// Tries resolvers in order and returns the first resolved answer.
///
/// When none resolves, the first resolver's reason is reported.
pub struct ChainResolver {
    resolvers: Vec<Box<dyn VersionResolver>>,
}

impl ChainResolver {
    pub fn new(resolvers: Vec<Box<dyn VersionResolver>>) -> Self {
        Self { resolvers }
    }

    /// Configuration first, then the tools folder.
    pub fn standard() -> Self {
        Self::new(vec![Box::new(ConfigVersionResolver), Box::new(ToolsFolderResolver)])
    }
}

impl VersionResolver for ChainResolver {
    fn resolve(&self, project: &ProjectSettings) -> Resolution {
        let mut first_unknown = None;
        for resolver in &self.resolvers {
            match resolver.resolve(project) {
                resolved @ Resolution::Resolved(_) => return resolved,
                unknown => {
                    first_unknown.get_or_insert(unknown);
                }
            }
        }
        first_unknown.unwrap_or(Resolution::Unknown(UnknownReason::NotConfigured))
    }
}
