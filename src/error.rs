//! Error types for sticky
//!
//! All modules use `StickyResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sticky operations
pub type StickyResult<T> = Result<T, StickyError>;

/// All errors that can occur in sticky
#[derive(Error, Debug)]
pub enum StickyError {
    // Cache errors
    #[error("Integrity mismatch for {url}: expected {expected} but received {received}")]
    IntegrityMismatch {
        url: String,
        expected: String,
        received: String,
    },

    #[error("Upstream unavailable for {url}: {reason}")]
    UpstreamUnavailable {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Precache incomplete: {failed} of {total} entries failed")]
    PrecacheIncomplete {
        failed: usize,
        total: usize,
        #[source]
        source: Box<StickyError>,
    },

    #[error("Cache generation {0} is not active")]
    GenerationNotActive(String),

    #[error("Cache storage error: {0}")]
    CacheStorage(String),

    // Manifest errors
    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    #[error("Invalid digest '{token}': {reason}")]
    InvalidDigest { token: String, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // Worker lifecycle errors
    #[error("Worker script {url} violates the immutable cache contract: {reason}")]
    RegistrationContractViolation { url: String, reason: String },

    #[error("Unsolicited worker installation detected")]
    TamperDetected,

    #[error("This client is bricked after a detected tampering attempt")]
    Bricked,

    #[error("Worker host error: {0}")]
    Host(String),

    // Persisted state errors
    #[error("State store error: {0}")]
    Store(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl StickyError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an upstream error for a transport failure (no status received)
    pub fn unreachable(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            url: url.into(),
            status: None,
            reason: reason.into(),
        }
    }

    /// Create an upstream error for a non-success status
    pub fn upstream_status(url: impl Into<String>, status: u16) -> Self {
        Self::UpstreamUnavailable {
            url: url.into(),
            status: Some(status),
            reason: format!("status {}", status),
        }
    }

    /// Check if error is retryable
    ///
    /// Integrity failures and brick mode are never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::UpstreamUnavailable { .. })
    }

    /// Whether this error is a security event rather than an operational one
    pub fn is_security(&self) -> bool {
        matches!(
            self,
            Self::IntegrityMismatch { .. } | Self::TamperDetected | Self::Bricked
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Bricked | Self::TamperDetected => Some(
                "Report this incident to the site operators. Run `sticky reset --yes` only once the origin is trusted again",
            ),
            Self::IntegrityMismatch { .. } => {
                Some("The server content does not match the manifest. Do not trust this deployment")
            }
            Self::RegistrationContractViolation { .. } => Some(
                "Serve the worker script with: Cache-Control: public, max-age=31536000, immutable",
            ),
            Self::GenerationNotActive(_) => Some("Run: sticky precache"),
            _ => None,
        }
    }
}
