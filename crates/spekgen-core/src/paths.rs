//! Project path and namespace rules.
//!
//! Feature files are addressed by their project-relative path. The folder
//! part of that path determines two things in the generated code: the
//! folder path argument recorded in the feature metadata and the namespace
//! declaration. Both must be identical regardless of the host platform, so
//! `\` and `/` are treated as the same separator.

use std::path::{Path, PathBuf};

use crate::config::TargetLanguage;

/// Namespace used when the project has no default namespace and the
/// feature file sits in the project root.
pub const FALLBACK_NAMESPACE: &str = "Spekgen.GeneratedTests";

/// Directory (under the project folder) holding per-version generators.
pub const TOOLS_DIR: &str = ".spekgen/generators";

/// Split a project-relative path into its folder segments, dropping the
/// file name.
fn folder_segments(project_relative_path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = project_relative_path
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    segments.pop();
    segments
}

/// Convert a `Path` into a forward-slash string.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .filter(|c| c != "." && c != "/" && c != "\\")
        .collect::<Vec<_>>()
        .join("/")
}

/// Folder path argument embedded in generated metadata.
///
/// Empty for files in the project root, otherwise the folder with `/`
/// separators, e.g. `Folder1/Folder2`.
pub fn folder_path(project_relative_path: &str) -> String {
    folder_segments(project_relative_path).join("/")
}

/// Turn a folder name into a valid namespace identifier.
fn sanitize_segment(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Namespace declared in the generated file.
///
/// | default namespace | folder          | result                          |
/// |-------------------|-----------------|---------------------------------|
/// | `Default.NS`      | root            | `Default.NS`                    |
/// | `Default.NS`      | `Folder1/Sub`   | `Default.NS.Folder1.Sub`        |
/// | unset             | root            | [`FALLBACK_NAMESPACE`]          |
/// | unset             | `Folder1/Sub`   | `Folder1.Sub`                   |
pub fn namespace_for(default_namespace: Option<&str>, project_relative_path: &str) -> String {
    let folder_ns = folder_segments(project_relative_path)
        .into_iter()
        .map(sanitize_segment)
        .collect::<Vec<_>>()
        .join(".");
    let default_namespace = default_namespace.filter(|ns| !ns.is_empty());

    match (default_namespace, folder_ns.is_empty()) {
        (Some(ns), true) => ns.to_string(),
        (Some(ns), false) => format!("{}.{}", ns, folder_ns),
        (None, true) => FALLBACK_NAMESPACE.to_string(),
        (None, false) => folder_ns,
    }
}

/// Default project-relative path of the file generated for a feature,
/// e.g. `Specs/Login.feature` becomes `Specs/Login.feature.cs`.
pub fn generated_path_for(project_relative_path: &Path, language: TargetLanguage) -> PathBuf {
    let mut name = project_relative_path.as_os_str().to_os_string();
    name.push(".");
    name.push(language.extension());
    PathBuf::from(name)
}
