//! Error types for mqexport

use std::fmt;

/// Result type alias for mqexport operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for mqexport
#[derive(Debug)]
pub enum Error {
    /// A remote capability reported a failure
    Api { status: ApiStatus, message: String },
    /// IO errors
    Io(std::io::Error),
    /// HTTP transport errors
    Http(reqwest::Error),
    /// Arrow-related errors
    Arrow(arrow_schema::ArrowError),
    /// Serialization errors
    Serialization(String),
    /// Payload could not be decoded (base64 / UTF-8)
    Decode(String),
    /// Configuration errors
    Config(String),
    /// Trigger or work-unit message is malformed
    InvalidMessage(String),
    /// Retry budget exhausted on a retryable failure
    TooManyRetries { attempts: u32, last: Box<Error> },
    /// One or more units of a fan-out failed
    Aggregate(AggregateError),
    /// Internal error
    Internal(String),
}

/// Classification of a failure reported by a remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    TooManyRequests,
    ResourceExhausted,
    InternalServerError,
    BadGateway,
    ServiceUnavailable,
    AlreadyExists,
    Conflict,
    NotFound,
    PermissionDenied,
    InvalidArgument,
    Other(u16),
}

impl ApiStatus {
    /// Classify an HTTP status code, refined by the `status` string of a
    /// Google-style error body when one is present.
    pub fn from_http(code: u16, status: Option<&str>) -> Self {
        match status {
            Some("RESOURCE_EXHAUSTED") => return Self::ResourceExhausted,
            Some("ALREADY_EXISTS") => return Self::AlreadyExists,
            _ => {}
        }
        match code {
            400 => Self::InvalidArgument,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::TooManyRequests,
            500 => Self::InternalServerError,
            502 => Self::BadGateway,
            503 => Self::ServiceUnavailable,
            other => Self::Other(other),
        }
    }

    /// Statuses the monitoring query is retried on.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TooManyRequests
                | Self::ResourceExhausted
                | Self::InternalServerError
                | Self::BadGateway
                | Self::ServiceUnavailable
        )
    }
}

impl fmt::Display for ApiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiStatus::Other(code) => write!(f, "HTTP {}", code),
            other => write!(f, "{:?}", other),
        }
    }
}

impl Error {
    /// Shorthand for an API failure
    pub fn api(status: ApiStatus, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
        }
    }

    /// API status of this error, if it came from a remote capability
    pub fn api_status(&self) -> Option<ApiStatus> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the monitoring retry policy should try again
    pub fn is_retryable(&self) -> bool {
        self.api_status().is_some_and(|s| s.is_retryable())
    }

    /// Whether a create call lost an idempotency race
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self.api_status(),
            Some(ApiStatus::AlreadyExists | ApiStatus::Conflict)
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.api_status() == Some(ApiStatus::NotFound)
    }
}

/// Failure of a single unit of fan-out work
#[derive(Debug)]
pub struct UnitFailure {
    /// Human readable unit label, e.g. `project:metric`
    pub label: String,
    pub error: Error,
}

/// Collected failures of a fan-out, raised after every unit completed
#[derive(Debug)]
pub struct AggregateError {
    pub failed: usize,
    pub total: usize,
    pub failures: Vec<UnitFailure>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} work units failed: ", self.failed, self.total)?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "[{}] {}", failure.label, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            Error::Arrow(e) => Some(e),
            Error::TooManyRetries { last, .. } => Some(last.as_ref()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Arrow(e) => write!(f, "Arrow error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Decode(msg) => write!(f, "Decode error: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidMessage(msg) => write!(f, "Invalid message: {}", msg),
            Error::TooManyRetries { attempts, last } => {
                write!(f, "Gave up after {} attempts: {}", attempts, last)
            }
            Error::Aggregate(e) => write!(f, "{}", e),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(e: arrow_schema::ArrowError) -> Self {
        Error::Arrow(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<AggregateError> for Error {
    fn from(e: AggregateError) -> Self {
        Error::Aggregate(e)
    }
}
