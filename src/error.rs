//! Error taxonomy shared by transports, adapters, the orchestrator and storage.
//!
//! Per-source failures are values (see `orchestrator::SourceOutcome`), so every
//! variant here is `Clone` and cheap to carry next to successful results.

use thiserror::Error;

/// Result alias used across the library surface.
pub type Result<T> = std::result::Result<T, MarketError>;

/// Failure of a single delivery mechanism (or of the whole fallback chain,
/// in which case the last observed failure is reported).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Remote answered with a status >= 400.
    #[error("HTTP {0}")]
    Status(u16),

    /// Request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Request(String),

    /// The host forward proxy itself failed (HTTP or decoding level).
    #[error("forward proxy failed: {0}")]
    Proxy(String),

    /// The forward proxy answered with a non-zero application code.
    #[error("forward proxy error ({code}): {message}")]
    ProxyEnvelope { code: i64, message: String },

    #[error("too many redirects")]
    TooManyRedirects,

    /// Mechanism not usable in this environment (e.g. no host configured).
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("request timed out")]
    Timeout,

    #[error("socket error: {0}")]
    Io(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// Storage backend failure (one candidate root).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// Host file API returned a non-zero code or a failing HTTP status.
    #[error("file api error: {0}")]
    Api(String),

    /// Path escapes the storage root or is otherwise unusable.
    #[error("path rejected: {path} - {reason}")]
    PathValidation { path: String, reason: String },

    #[error("no storage root accepted the write")]
    NoCandidate,
}

/// Top-level error type for every user-initiated operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarketError {
    /// All delivery mechanisms exhausted.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Remote service answered with a non-success application code.
    #[error("{message}")]
    Upstream { source_id: String, message: String },

    /// Malformed JSON / HTML / SVG.
    #[error("parse error: {0}")]
    Parse(String),

    /// No usable SVG markup, invalid color, missing id ...
    #[error("{0}")]
    Validation(String),

    /// Write/delete failed after trying all candidate storage roots.
    #[error("{message}")]
    Persistence { source_id: String, message: String },

    #[error("unknown source: {0}")]
    UnknownSource(String),
}

impl MarketError {
    pub fn upstream(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable kind, used for API bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Upstream { .. } => "upstream",
            Self::Parse(_) => "parse",
            Self::Validation(_) => "validation",
            Self::Persistence { .. } => "persistence",
            Self::UnknownSource(_) => "unknown_source",
        }
    }
}
