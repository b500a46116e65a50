//! Error taxonomy shared by the extractor, the normalizer and the runtime.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of failure a request can end in.
///
/// Only the terminal kinds (`IdentifierMissing`, `RenderExhausted`,
/// `FetchFailed`, `NoContentExtracted`, `Cancelled`) ever reach an envelope.
/// `ProbeFailed`, `RenderTimeout` and `ValidationRejected` are recovered
/// locally and only show up in logs and attempt diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The URL carries no recognizable transaction identifier.
    IdentifierMissing,
    /// The strategy probe could not classify the URL.
    ProbeFailed,
    /// A single render attempt exceeded its wall-clock budget.
    RenderTimeout,
    /// Every render attempt failed or timed out.
    RenderExhausted,
    /// A direct fetch could not produce usable markup.
    FetchFailed,
    /// Markup was acquired but nothing could be extracted from it.
    NoContentExtracted,
    /// A captured value failed its rule's validator.
    ValidationRejected,
    /// The caller cancelled the pipeline.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentifierMissing => "identifierMissing",
            Self::ProbeFailed => "probeFailed",
            Self::RenderTimeout => "renderTimeout",
            Self::RenderExhausted => "renderExhausted",
            Self::FetchFailed => "fetchFailed",
            Self::NoContentExtracted => "noContentExtracted",
            Self::ValidationRejected => "validationRejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal acquisition failure handed to the normalizer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} after {attempts} attempt(s): {message}")]
pub struct AcquisitionError {
    pub kind: ErrorKind,
    pub attempts: u32,
    pub message: String,
}

impl AcquisitionError {
    pub fn new(kind: ErrorKind, attempts: u32, message: impl Into<String>) -> Self {
        Self {
            kind,
            attempts,
            message: message.into(),
        }
    }

    pub fn identifier_missing(url: &str) -> Self {
        Self::new(
            ErrorKind::IdentifierMissing,
            0,
            format!("no transaction identifier found in {url}"),
        )
    }

    pub fn render_exhausted(attempts: u32, last_failure: impl Into<String>) -> Self {
        Self::new(ErrorKind::RenderExhausted, attempts, last_failure)
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, 0, reason)
    }
}

/// A URL that cannot be turned into an acquisition request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidUrl {
    #[error("invalid URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported URL scheme `{0}` (expected http or https)")]
    Scheme(String),
}

/// Errors raised while loading a pattern library.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ProfileError {
    #[error("pattern library parse error: {0}")]
    Parse(String),

    #[error("profile `{profile}`: invalid regex for `{field}`: {message}")]
    InvalidPattern {
        profile: String,
        field: String,
        message: String,
    },

    #[error("profile `{profile}`: invalid selector for `{field}`: {message}")]
    InvalidSelector {
        profile: String,
        field: String,
        message: String,
    },

    #[error("profile `{profile}`: rule for `{field}` needs exactly one of `pattern` or `selector`")]
    MissingMatcher { profile: String, field: String },

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProfileError {
    fn from(e: std::io::Error) -> Self {
        ProfileError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for ProfileError {
    fn from(e: serde_json::Error) -> Self {
        ProfileError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_serializes_camel_case() {
        let json = serde_json::to_string(&ErrorKind::RenderExhausted).unwrap();
        assert_eq!(json, "\"renderExhausted\"");
        assert_eq!(ErrorKind::NoContentExtracted.to_string(), "noContentExtracted");
    }

    #[test]
    fn test_acquisition_error_display() {
        let err = AcquisitionError::render_exhausted(5, "renderer exited with status 1");
        assert_eq!(
            err.to_string(),
            "renderExhausted after 5 attempt(s): renderer exited with status 1"
        );
    }
}
