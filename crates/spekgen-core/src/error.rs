//! Error types for spekgen-core.

use thiserror::Error;

/// Result type for spekgen-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in spekgen-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to parse a feature file.
    #[error("parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    Parse {
        line: Option<usize>,
        message: String,
    },

    /// The code emitter could not produce a test body.
    #[error("emit error: {0}")]
    Emit(String),

    /// Invalid or unreadable project configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// IPC communication error with a generator worker.
    #[error("IPC error: {0}")]
    Ipc(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The worker reported a failure while generating.
    #[error("worker error: {0}")]
    Worker(String),

    /// A worker answered with a different generator version than requested.
    #[error("generator version mismatch: expected {expected}, worker reported {found}")]
    VersionMismatch {
        expected: semver::Version,
        found: semver::Version,
    },

    /// An operation did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Generated file header is missing or malformed.
    #[error("header error: {0}")]
    Header(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a parse error attached to a source line.
    pub fn parse_at(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line: Some(line),
            message: message.into(),
        }
    }

    /// Source line the error refers to, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::Parse { line, .. } => *line,
            _ => None,
        }
    }

    /// Format the error with a short recovery hint for CLI output.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Config(_) => Some("check spekgen.toml in the project folder"),
            Error::Ipc(_) | Error::Timeout(_) => {
                Some("the pinned generator could not be started; set SPEKGEN_WORKER_PATH or fix [generator].path")
            }
            Error::Parse { .. } => Some("fix the feature file and regenerate"),
            _ => None,
        };
        match hint {
            Some(hint) => format!("{}\n  hint: {}", self, hint),
            None => self.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<semver::Error> for Error {
    fn from(e: semver::Error) -> Self {
        Error::Config(format!("invalid version: {}", e))
    }
}
