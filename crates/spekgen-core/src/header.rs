//! Header and footer of generated files.
//!
//! The header identifies the tool and carries the generator version and
//! the fingerprint used by content-based freshness checks. The lines are
//! greppable: `Spekgen Generator Version:<semver>` and
//! `Spekgen Fingerprint:<16 hex digits>`.

use semver::Version;

use crate::config::TargetLanguage;
use crate::error::{Error, Result};
use crate::freshness::Fingerprint;

/// Marker identifying generated files.
pub const GENERATED_BY: &str = "This code was generated by Spekgen";

const GENERATOR_VERSION_TOKEN: &str = "Spekgen Generator Version:";
const FINGERPRINT_TOKEN: &str = "Spekgen Fingerprint:";
const TOOL_VERSION_TOKEN: &str = "Spekgen Version:";

/// How many leading lines are searched for header tokens.
const HEADER_SCAN_LINES: usize = 30;

/// Inputs for writing a file header.
#[derive(Debug, Clone)]
pub struct HeaderInfo<'a> {
    pub fingerprint: &'a Fingerprint,
    pub namespace: &'a str,
    pub language: TargetLanguage,
}

/// Reads and writes the provenance header of generated files.
pub trait HeaderWriter: Send + Sync {
    /// Everything before the test body: comment block, designer region
    /// opening and namespace opening.
    fn write_header(&self, info: &HeaderInfo<'_>) -> String;

    /// Everything after the test body.
    fn write_footer(&self, language: TargetLanguage) -> String;

    /// Version of the generator that produced `generated`.
    fn detect_generated_test_version(&self, generated: &str) -> Result<Version>;

    /// Fingerprint recorded in `generated`.
    fn detect_fingerprint(&self, generated: &str) -> Result<Fingerprint>;
}

/// Default header format.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardHeaderWriter;

impl StandardHeaderWriter {
    pub fn new() -> Self {
        Self
    }

    fn find_token<'a>(generated: &'a str, token: &str) -> Result<&'a str> {
        generated
            .lines()
            .take(HEADER_SCAN_LINES)
            .find_map(|line| {
                let idx = line.find(token)?;
                Some(line[idx + token.len()..].trim())
            })
            .ok_or_else(|| Error::Header(format!("'{}' not found in generated file", token.trim_end_matches(':'))))
    }
}

impl HeaderWriter for StandardHeaderWriter {
    fn write_header(&self, info: &HeaderInfo<'_>) -> String {
        let c = match info.language {
            TargetLanguage::CSharp => "//",
            TargetLanguage::Vb => "'",
        };
        let rule = format!("{} ------------------------------------------------------------------------------", c);
        let lines = [
            rule.clone(),
            format!("{}  <auto-generated>", c),
            format!("{}      {} (https://github.com/spekgen/spekgen).", c, GENERATED_BY),
            format!("{}      {}{}", c, TOOL_VERSION_TOKEN, env!("CARGO_PKG_VERSION")),
            format!("{}      {}{}", c, GENERATOR_VERSION_TOKEN, info.fingerprint.version),
            format!("{}      {}{}", c, FINGERPRINT_TOKEN, info.fingerprint.digest_hex()),
            c.to_string(),
            format!("{}      Changes to this file may cause incorrect behavior and will be lost if", c),
            format!("{}      the code is regenerated.", c),
            format!("{}  </auto-generated>", c),
            rule,
        ];

        let mut out = lines.join("\n");
        out.push('\n');
        match info.language {
            TargetLanguage::CSharp => {
                out.push_str("#region Designer generated code\n");
                out.push_str("#pragma warning disable\n");
                out.push_str(&format!("namespace {}\n{{\n", info.namespace));
            }
            TargetLanguage::Vb => {
                out.push_str("#Region \"Designer generated code\"\n");
                out.push_str("#Disable Warning\n");
                out.push_str(&format!("Namespace {}\n", info.namespace));
            }
        }
        out
    }

    fn write_footer(&self, language: TargetLanguage) -> String {
        match language {
            TargetLanguage::CSharp => "}\n#pragma warning restore\n#endregion\n".to_string(),
            TargetLanguage::Vb => "End Namespace\n#Enable Warning\n#End Region\n".to_string(),
        }
    }

    fn detect_generated_test_version(&self, generated: &str) -> Result<Version> {
        let token = Self::find_token(generated, GENERATOR_VERSION_TOKEN)?;
        Version::parse(token).map_err(|e| Error::Header(format!("invalid generator version '{}': {}", token, e)))
    }

    fn detect_fingerprint(&self, generated: &str) -> Result<Fingerprint> {
        let version = self.detect_generated_test_version(generated)?;
        let token = Self::find_token(generated, FINGERPRINT_TOKEN)?;
        let digest = u64::from_str_radix(token, 16)
            .map_err(|e| Error::Header(format!("invalid fingerprint '{}': {}", token, e)))?;
        Ok(Fingerprint { version, digest })
    }
}
