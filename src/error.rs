//! Error types for request binding, validation, transport, and provider
//! error classification.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ApiError>;

/// Provider-agnostic error categories that callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The addressed resource does not exist.
    NotFound,
    /// The request was rejected as malformed or semantically invalid.
    InvalidInput,
    /// The resource already exists or is in a conflicting state.
    Conflict,
    /// Credentials were missing, invalid, or insufficient.
    AuthFailure,
    /// The provider throttled the caller.
    RateLimited,
    /// The provider failed internally.
    ServerFault,
    /// Several underlying failures of different kinds reported in one response.
    Batch,
    /// The provider's error could not be mapped to a known kind.
    Unclassified,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::InvalidInput => "invalid input",
            Self::Conflict => "conflict",
            Self::AuthFailure => "auth failure",
            Self::RateLimited => "rate limited",
            Self::ServerFault => "server fault",
            Self::Batch => "batch failure",
            Self::Unclassified => "unclassified",
        };
        f.write_str(name)
    }
}

/// The raw code/type/message triplet a provider reported for one failure.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderErrorDetail {
    pub code: Option<String>,
    pub error_type: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
}

/// A classified provider error.
///
/// `message` is always populated; when the payload could not be parsed it holds
/// the raw body text. `messages` lists every distinct provider message in the
/// order first seen, so batch failures expose all of them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} (HTTP {status}): {message}")]
pub struct CanonicalError {
    pub kind: ErrorKind,
    pub status: u16,
    pub message: String,
    pub messages: Vec<String>,
    pub detail: Option<ProviderErrorDetail>,
}

impl CanonicalError {
    /// An error for which nothing structured could be extracted.
    pub fn unclassified(status: u16, text: impl Into<String>) -> Self {
        let message = text.into();
        Self {
            kind: ErrorKind::Unclassified,
            status,
            messages: vec![message.clone()],
            message,
            detail: None,
        }
    }

    /// The provider error code from the first structured entry, if any.
    pub fn code(&self) -> Option<&str> {
        self.detail.as_ref().and_then(|d| d.code.as_deref())
    }
}

/// Failure reported by the transport collaborator. Passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
    /// Whether the transport considers the failure transient (connect reset,
    /// timeout). The core never retries on its own.
    pub retryable: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: true,
        }
    }
}

/// Unified error type for one API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Invalid or inconsistent operation catalog or runtime configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The requested operation is not in the catalog.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The argument list does not match the operation's parameter list.
    #[error("Operation '{operation}' expects {expected} arguments, got {actual}")]
    ArgumentCount {
        operation: String,
        expected: usize,
        actual: usize,
    },

    /// A parameter was rejected by one of its validators. Never sent over the wire.
    #[error("Invalid argument '{parameter}' ({validator}): {reason}")]
    InvalidArgument {
        parameter: String,
        validator: String,
        reason: String,
    },

    /// A validator or coercion rule was handed a value of a type it does not accept.
    #[error("Type mismatch for '{parameter}' ({validator}): expected {expected}, found {found}")]
    TypeMismatch {
        parameter: String,
        validator: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A path template slot had no value to substitute.
    #[error("Missing path parameter: {0}")]
    MissingPathParameter(String),

    /// The provider answered with a failure status.
    #[error(transparent)]
    Remote(#[from] CanonicalError),

    /// The transport could not produce a response.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl ApiError {
    /// The canonical kind for this error. Transport failures have none; local
    /// argument and binding failures are [`ErrorKind::InvalidInput`].
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::InvalidArgument { .. }
            | Self::TypeMismatch { .. }
            | Self::MissingPathParameter(_)
            | Self::ArgumentCount { .. } => Some(ErrorKind::InvalidInput),
            Self::Remote(err) => Some(err.kind),
            Self::Config(_) | Self::UnknownOperation(_) | Self::Transport(_) => None,
        }
    }

    /// Returns `true` for failures that may succeed when the call is re-run:
    /// rate limiting, server faults, and transient transport failures. An
    /// unclassified response counts when its status is 429 or 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(err) => match err.kind {
                ErrorKind::RateLimited | ErrorKind::ServerFault => true,
                ErrorKind::Unclassified => err.status == 429 || err.status >= 500,
                _ => false,
            },
            Self::Transport(err) => err.retryable,
            _ => false,
        }
    }

    /// Returns `true` when the failure was detected locally, before any request
    /// reached the transport.
    pub fn is_local(&self) -> bool {
        !matches!(self, Self::Remote(_) | Self::Transport(_))
    }
}
