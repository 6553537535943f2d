use std::fmt;

/// Boxed error carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// I/O failure talking to the server, after `attempts` tries.
    #[error("network error after {attempts} attempt(s): {source}")]
    Network { attempts: usize, source: BoxError },
    /// Non-I/O transport failure (request construction, redirect policy...).
    /// Never retried.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
    /// Structured error returned by the API for a non-success status.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Response payload was malformed or missing required fields.
    #[error("invalid data: {0}")]
    InvalidData(String),
    /// The logical request could not be turned into a wire request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The call was canceled before it completed.
    #[error("request cancelled")]
    Cancelled,
}

impl LedgerError {
    pub(crate) fn from_transport(err: TransportError, attempts: usize) -> Self {
        match err {
            TransportError::Network(source) => Self::Network { attempts, source },
            TransportError::Other(source) => Self::Transport(source),
        }
    }

    /// Returns the API error if this is one.
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }
}

/// Failure raised by a [`Transport`](crate::Transport) for a single exchange.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O failure (connect, timeout, reset, truncated body). Retryable.
    #[error("network i/o failure: {0}")]
    Network(#[source] BoxError),
    /// Anything else. Not retryable.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl TransportError {
    pub fn network(err: impl Into<BoxError>) -> Self {
        Self::Network(err.into())
    }

    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::Network(Box::new(err))
        } else {
            Self::Other(Box::new(err))
        }
    }
}

/// Broad category of an [`ApiError`], derived from its status code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiErrorKind {
    BadRequest,
    Unauthorized,
    PermissionDenied,
    NotFound,
    Conflict,
    UnprocessableEntity,
    RateLimited,
    InternalServer,
    Unexpected,
}

/// Error returned by the API for a non-success HTTP status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code from the error envelope.
    pub code: Option<String>,
    /// Human-readable message from the error envelope.
    pub message: Option<String>,
    /// Request parameter the error refers to, if any.
    pub parameter: Option<String>,
    /// Raw response body text.
    pub body: String,
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self.status {
            400 => ApiErrorKind::BadRequest,
            401 => ApiErrorKind::Unauthorized,
            403 => ApiErrorKind::PermissionDenied,
            404 => ApiErrorKind::NotFound,
            409 => ApiErrorKind::Conflict,
            422 => ApiErrorKind::UnprocessableEntity,
            429 => ApiErrorKind::RateLimited,
            500..=599 => ApiErrorKind::InternalServer,
            _ => ApiErrorKind::Unexpected,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api error {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, " ({code})")?;
        }
        match &self.message {
            Some(message) => write!(f, ": {message}"),
            None => write!(f, ": {}", self.body),
        }
    }
}

impl std::error::Error for ApiError {}
