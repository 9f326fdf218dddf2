// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

//! The error catalog shared by every taskwire crate.
//!
//! Every failure the runtime can produce — from a malformed spec document to
//! a server reporting a failed job — is a variant of [`Error`]. Downstream
//! crates do not define their own error types; they construct and propagate
//! this one so callers can match on a single enum regardless of which stage
//! of the pipeline failed.

use std::fmt;

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The unified error type for taskwire.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Spec loader ─────────────────────────────────────────────────
    /// No spec document could be found at the given location or any of its
    /// fallback paths.
    #[error("spec not found: {0}")]
    SpecNotFound(String),

    /// A spec document was found but could not be parsed as JSON.
    #[error("spec malformed: {0}")]
    SpecMalformed(String),

    // ── Parsers ─────────────────────────────────────────────────────
    /// The parser could not classify the spec or extract any endpoints.
    #[error("unsupported spec: {0}")]
    UnsupportedSpec(String),

    // ── Authentication ──────────────────────────────────────────────
    /// No API key was supplied and none could be found in the environment.
    #[error("missing API key for {provider}; set {env_var}")]
    ApiKeyMissing {
        /// The provider requiring a key.
        provider: String,
        /// The environment variable that was consulted.
        env_var: String,
    },

    /// An API key was supplied but fails the provider's format rules.
    #[error("invalid API key for {provider}: {reason} (sign up at {signup_url})")]
    ApiKeyInvalid {
        /// The provider whose key validation failed.
        provider: String,
        /// Human-readable reason the key was rejected.
        reason: String,
        /// URL where a valid key can be obtained.
        signup_url: String,
    },

    // ── Request assembly ────────────────────────────────────────────
    /// A required parameter was not supplied and has no default.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// A supplied parameter value does not satisfy its definition.
    #[error("invalid value for parameter {name}: {reason}")]
    InvalidParameterValue {
        /// The parameter name.
        name: String,
        /// Human-readable reason the value was rejected.
        reason: String,
    },

    // ── File handler ────────────────────────────────────────────────
    /// The total size of files to upload exceeds the configured hard cap.
    #[error("file batch too large: {actual_mb:.1}MB exceeds cap of {max_mb:.1}MB")]
    FileTooLarge {
        /// Observed total size in megabytes.
        actual_mb: f64,
        /// The configured maximum in megabytes.
        max_mb: f64,
    },

    /// The cloud uploader failed to upload one or more files.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A local file referenced by a parameter could not be read.
    #[error("file not readable: {0}")]
    FileNotReadable(String),

    // ── Transport ────────────────────────────────────────────────────
    /// The HTTP request could not be completed (connection error, etc.).
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The server responded 401/403.
    #[error("unauthorized: {hint}")]
    Unauthorized {
        /// A hint about what's likely missing (e.g. "missing API key").
        hint: String,
    },

    /// The server responded 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server responded with a non-2xx status not otherwise classified.
    #[error("http error {status}: {body_snippet}")]
    HttpError {
        /// The HTTP status code.
        status: u16,
        /// A truncated snippet of the response body, for diagnostics.
        body_snippet: String,
    },

    // ── Job lifecycle ───────────────────────────────────────────────
    /// The remote server reported the job as failed.
    #[error("server job failed: {0}")]
    ServerJobFailed(String),

    /// The remote server reported the job as cancelled.
    #[error("server job cancelled")]
    ServerJobCancelled,

    /// Polling exceeded its total time budget without reaching a terminal
    /// status.
    #[error("poll timeout after {elapsed_secs}s")]
    PollTimeout {
        /// Total seconds spent polling before giving up.
        elapsed_secs: u64,
    },

    // ── Registry ─────────────────────────────────────────────────────
    /// A service with the given id already exists in the registry.
    #[error("duplicate service id: {0}")]
    DuplicateId(String),

    // ── System ───────────────────────────────────────────────────────
    /// An I/O operation failed.
    #[error("io error: {0}")]
    Io(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Stable, machine-matchable kind name (snake_case), independent of the
    /// interpolated message. Useful for tests and telemetry.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpecNotFound(_) => "spec_not_found",
            Self::SpecMalformed(_) => "spec_malformed",
            Self::UnsupportedSpec(_) => "unsupported_spec",
            Self::ApiKeyMissing { .. } => "api_key_missing",
            Self::ApiKeyInvalid { .. } => "api_key_invalid",
            Self::MissingParameter(_) => "missing_parameter",
            Self::InvalidParameterValue { .. } => "invalid_parameter_value",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::UploadFailed(_) => "upload_failed",
            Self::FileNotReadable(_) => "file_not_readable",
            Self::RequestFailed(_) => "request_failed",
            Self::Unauthorized { .. } => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::HttpError { .. } => "http_error",
            Self::ServerJobFailed(_) => "server_job_failed",
            Self::ServerJobCancelled => "server_job_cancelled",
            Self::PollTimeout { .. } => "poll_timeout",
            Self::DuplicateId(_) => "duplicate_id",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }

    /// Returns `true` for errors the polling stage considers transient and
    /// therefore retries (connection failures and `HttpError` with a 5xx
    /// status).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) => true,
            Self::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// A lightweight, serializable projection of an [`Error`] suitable for
/// attaching to a failed [`crate::job::Job`] without requiring `Error` itself
/// to implement `Clone`/`Serialize` (it wraps arbitrary message strings and a
/// `thiserror` source chain, neither of which round-trip cleanly).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ErrorSnapshot {
    /// The stable kind string, see [`Error::kind`].
    pub kind: String,
    /// The rendered display message at the time of capture.
    pub message: String,
}

impl From<&Error> for ErrorSnapshot {
    fn from(e: &Error) -> Self {
        Self {
            kind: e.kind().to_string(),
            message: e.to_string(),
        }
    }
}

impl fmt::Display for ErrorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_stable_and_independent_of_message() {
        let a = Error::MissingParameter("image".into());
        let b = Error::MissingParameter("voice".into());
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.kind(), "missing_parameter");
    }

    #[test]
    fn transient_covers_connection_and_5xx() {
        assert!(Error::RequestFailed("connection reset".into()).is_transient());
        assert!(
            Error::HttpError {
                status: 503,
                body_snippet: String::new()
            }
            .is_transient()
        );
        assert!(
            !Error::HttpError {
                status: 404,
                body_snippet: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn snapshot_captures_kind_and_message() {
        let e = Error::ServerJobCancelled;
        let snap = ErrorSnapshot::from(&e);
        assert_eq!(snap.kind, "server_job_cancelled");
        assert_eq!(snap.message, e.to_string());
    }
}
