//! Up-to-date checks for generated files.
//!
//! Freshness is decided in two phases:
//!
//! 1. A **preliminary** check that only looks at the filesystem
//!    (existence and modification times). It answers `Some(true)`,
//!    `Some(false)` or `None` when it cannot decide cheaply.
//! 2. An authoritative **content** check, run only when the preliminary
//!    check returned `None`. It compares the fingerprint in the header of
//!    the existing generated file with the [`Fingerprint`] the current
//!    settings would produce. Both checking methods use it; they differ
//!    only in whether timestamps may short-circuit it.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use semver::Version;

use crate::config::UpToDateCheckingMethod;
use crate::generator::GenerationRequest;
use crate::header::HeaderWriter;
use crate::input::FeatureFileInput;

/// Identity of a generated file: generator version plus a digest of every
/// input that shapes the output.
///
/// The digest ends up in committed files, so it is computed with BLAKE3
/// over an explicit byte encoding: a domain tag followed by each field as
/// a big-endian `u64` length and its UTF-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub version: Version,
    pub digest: u64,
}

const FINGERPRINT_DOMAIN: &[u8] = b"spekgen-fingerprint-v1";

fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_be_bytes());
    hasher.update(field.as_bytes());
}

impl Fingerprint {
    /// Fingerprint of the output `version` would produce for `request`.
    pub fn compute(version: &Version, request: &GenerationRequest, namespace: &str) -> Self {
        // Line endings must not make a checkout on another OS look stale.
        let feature = request.feature_content.lines().collect::<Vec<_>>().join("\n");
        let platform = &request.context.platform;

        let version_text = version.to_string();
        let fields: [&str; 7] = [
            &version_text,
            &feature,
            &request.context.source_file,
            &request.context.folder_path,
            platform.language.extension(),
            platform.unit_test_provider.as_str(),
            namespace,
        ];

        let mut hasher = blake3::Hasher::new();
        hasher.update(FINGERPRINT_DOMAIN);
        for field in fields {
            update_field(&mut hasher, field);
        }

        let hash = hasher.finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);

        Self {
            version: version.clone(),
            digest: u64::from_be_bytes(prefix),
        }
    }

    /// Digest as 16 lowercase hex digits.
    pub fn digest_hex(&self) -> String {
        format!("{:016x}", self.digest)
    }
}

/// Decides whether a generated file must be regenerated.
pub trait UpToDateChecker: Send + Sync {
    /// Cheap filesystem-only check. `None` means "escalate to the content check".
    fn is_up_to_date_preliminary(
        &self,
        input: &FeatureFileInput,
        feature_path: &Path,
        generated_path: &Path,
        method: UpToDateCheckingMethod,
    ) -> Option<bool>;

    /// Authoritative check against the existing generated content.
    fn is_up_to_date(
        &self,
        input: &FeatureFileInput,
        generated_content: &str,
        expected: &Fingerprint,
        method: UpToDateCheckingMethod,
    ) -> bool;
}

/// Default checker: timestamps, then the header fingerprint.
pub struct StandardUpToDateChecker {
    header: Arc<dyn HeaderWriter>,
}

impl StandardUpToDateChecker {
    pub fn new(header: Arc<dyn HeaderWriter>) -> Self {
        Self { header }
    }

    fn modified(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }
}

impl UpToDateChecker for StandardUpToDateChecker {
    fn is_up_to_date_preliminary(
        &self,
        input: &FeatureFileInput,
        feature_path: &Path,
        generated_path: &Path,
        method: UpToDateCheckingMethod,
    ) -> Option<bool> {
        // Pre-loaded generated content may not match what is on disk.
        if input.generated_content.is_some() {
            return None;
        }

        if !generated_path.exists() {
            tracing::debug!("{} does not exist", generated_path.display());
            return Some(false);
        }

        match method {
            UpToDateCheckingMethod::FileContent => None,
            UpToDateCheckingMethod::ModificationTimeAndGeneratorVersion => {
                if input.feature_content.is_some() {
                    return None;
                }
                let feature_time = Self::modified(feature_path)?;
                let generated_time = Self::modified(generated_path)?;
                if feature_time > generated_time {
                    tracing::debug!("{} is newer than its generated file", feature_path.display());
                    return Some(false);
                }
                None
            }
        }
    }

    fn is_up_to_date(
        &self,
        _input: &FeatureFileInput,
        generated_content: &str,
        expected: &Fingerprint,
        method: UpToDateCheckingMethod,
    ) -> bool {
        // Both methods end here; they differ only in the timestamp shortcut.
        match self.header.detect_fingerprint(generated_content) {
            Ok(found) if found.version != expected.version => {
                tracing::debug!(
                    "Generated by {} but current generator is {} ({:?})",
                    found.version,
                    expected.version,
                    method
                );
                false
            }
            Ok(found) => found.digest == expected.digest,
            Err(e) => {
                tracing::debug!("Cannot read fingerprint: {}", e);
                false
            }
        }
    }
}
