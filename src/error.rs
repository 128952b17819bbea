use std::time::Duration;
use thiserror::Error;

/// Failures raised by the extraction collaborators (page scraper, embed provider).
///
/// These never leave the extraction chain; they are folded into a [`ResolveError`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum UpstreamError {
    #[error("upstream unavailable: {0}")]
    Unavailable(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("no metadata extracted: {0}")]
    NoMetadata(String),

    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        Self::Unavailable(e.to_string())
    }
}

/// Request-level failure. Exactly one of these is surfaced per resolution.
///
/// `Clone` because a single fetch outcome is broadcast to every coalesced waiter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("could not get metadata for page: primary: {primary}; fallback: {fallback}")]
    ExtractionFailed { primary: String, fallback: String },

    #[error("raw mode is not supported when only the fallback is reachable: {cause}")]
    RawUnsupportedOnFallback { cause: String },

    #[error("could not encode result: {0}")]
    EncodingFailed(String),
}

impl ResolveError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// A failure that happened outside either extractor, e.g. an aborted fetch task.
    pub fn aborted(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self::ExtractionFailed {
            primary: msg.clone(),
            fallback: msg,
        }
    }

    /// HTTP status for this error kind
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::ExtractionFailed { .. } | Self::RawUnsupportedOnFallback { .. } => 424,
            Self::EncodingFailed(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::RawUnsupportedOnFallback { .. } => "raw_unsupported_on_fallback",
            Self::EncodingFailed(_) => "encoding_failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum UnfurlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, UnfurlError>;
