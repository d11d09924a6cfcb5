//! Error taxonomy for the media filesystem.
//!
//! Remote failures fall into three groups: transient ones the pacer retries,
//! rejected content that is surfaced immediately, and not-found outcomes that
//! callers treat as a recognised answer rather than a failure.

use thiserror::Error;

/// HTTP status codes the pacer treats as transient.
pub const RETRY_STATUS_CODES: &[u16] = &[
    401, // token may have expired, a refreshed one can succeed
    429, // Too Many Requests
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
    509, // Bandwidth Limit Exceeded
];

pub type Result<T> = std::result::Result<T, MediaFsError>;

#[derive(Debug, Error)]
pub enum MediaFsError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("shopware does not allow this file extension: {0}")]
    ExtensionNotAllowed(String),

    #[error("directory not found: {0}")]
    NotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("directory already exists: {0}")]
    DirExists(String),

    #[error("can't move: {0}")]
    CantMove(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),

    #[error("hash type not supported")]
    HashUnsupported,

    #[error("modification time can't be set")]
    ModTimeNotSettable,

    #[error("operation cancelled")]
    Cancelled,

    #[error("giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<MediaFsError>,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<MediaFsError>,
    },
}

impl MediaFsError {
    /// Whether the pacer should try the call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            MediaFsError::Http { status, .. } => RETRY_STATUS_CODES.contains(status),
            MediaFsError::Transport(_) => true,
            MediaFsError::Context { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            MediaFsError::NotFound(_) | MediaFsError::ObjectNotFound(_) => true,
            MediaFsError::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// The error underneath any `Context` annotations
    pub fn root_cause(&self) -> &MediaFsError {
        match self {
            MediaFsError::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// HTTP status of the innermost error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            MediaFsError::Http { status, .. } => Some(*status),
            MediaFsError::Context { source, .. } => source.status(),
            MediaFsError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MediaFsError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => MediaFsError::Http {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => MediaFsError::Transport(err.to_string()),
        }
    }
}

/// Annotates a failure with the operation that was being attempted.
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T>;

    fn with_context<C: Into<String>, F: FnOnce() -> C>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|source| MediaFsError::Context {
            context: context.into(),
            source: Box::new(source),
        })
    }

    fn with_context<C: Into<String>, F: FnOnce() -> C>(self, f: F) -> Result<T> {
        self.map_err(|source| MediaFsError::Context {
            context: f().into(),
            source: Box::new(source),
        })
    }
}
