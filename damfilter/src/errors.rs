use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds for filter operations
///
/// Each kind names one category of failure so that callers can tell a
/// malformed filter request apart from a misconfigured service or an
/// unavailable store.
///
/// # Examples
///
/// ```rust,ignore
/// use damfilter::errors::{DamError, ErrorKind, DamResult};
///
/// fn example() -> DamResult<()> {
///     Err(DamError::new("Unknown filter engine 'solr'", ErrorKind::ConfigurationError))
/// }
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    /// The service is wired up incorrectly (unknown engine, unregistered filter type)
    ConfigurationError,
    /// A filter value cannot be used as given (bad datetime, empty range, min above max)
    ValidationError,
    /// A field path could not be parsed
    InvalidFieldName,
    /// The storage backend failed to execute a query
    BackendError,
    /// A request or response could not be encoded or decoded
    EncodingError,
    /// Internal error (usually indicates a bug)
    InternalError,
}

impl ErrorKind {
    /// Returns `true` when the caller can correct the request and retry.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ErrorKind::ValidationError | ErrorKind::InvalidFieldName)
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConfigurationError => write!(f, "Configuration error"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::InvalidFieldName => write!(f, "Invalid field name"),
            ErrorKind::BackendError => write!(f, "Backend error"),
            ErrorKind::EncodingError => write!(f, "Encoding error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type of the filter engine.
///
/// `DamError` carries a message, an [ErrorKind], an optional cause and the
/// backtrace captured where it was raised.
///
/// # Examples
///
/// ```rust,ignore
/// use damfilter::errors::{DamError, ErrorKind};
///
/// let cause = DamError::new("connection refused", ErrorKind::BackendError);
/// let err = DamError::new_with_cause("Aggregation failed", ErrorKind::BackendError, cause);
/// ```
#[derive(Clone)]
pub struct DamError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DamError>>,
    backtrace: Arc<Backtrace>,
}

impl DamError {
    /// Creates a new `DamError` with the specified message and error kind.
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DamError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    /// Creates a new `DamError` that keeps `cause` in its chain.
    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DamError) -> Self {
        DamError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DamError> {
        self.cause.as_deref()
    }
}

impl Display for DamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(
                f,
                "{}: {}\nCaused by: {:?}",
                self.error_kind, self.message, cause
            ),
            None => write!(f, "{}: {}\n{:?}", self.error_kind, self.message, self.backtrace),
        }
    }
}

impl Error for DamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// `DamResult<T>` is shorthand for `Result<T, DamError>`.
pub type DamResult<T> = Result<T, DamError>;

impl From<serde_json::Error> for DamError {
    fn from(err: serde_json::Error) -> Self {
        DamError::new(&format!("JSON error: {}", err), ErrorKind::EncodingError)
    }
}

impl From<regex::Error> for DamError {
    fn from(err: regex::Error) -> Self {
        DamError::new(&format!("Invalid pattern: {}", err), ErrorKind::ValidationError)
    }
}

impl From<std::fmt::Error> for DamError {
    fn from(err: std::fmt::Error) -> Self {
        DamError::new(&format!("Formatting error: {}", err), ErrorKind::InternalError)
    }
}
