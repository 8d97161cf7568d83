//! Error types for sqlmapper operations.

use std::fmt;

use sqlmapper_reflect::ReflectionError;

/// The primary error type for all sqlmapper operations.
#[derive(Debug)]
pub enum Error {
    /// Malformed document, unknown setting, duplicate id, missing attribute.
    Builder(BuilderError),
    /// A reference whose target is not yet registered; absorbed by the
    /// pending queues and retried on later drains.
    Incomplete(IncompleteError),
    /// Ambiguous accessor, missing property, failed generic resolution.
    Reflection(ReflectionError),
    /// Unknown alias that is not a schema type name either.
    TypeAlias(TypeAliasError),
    /// Pool exhaustion, bad-connection overflow, closed pool, driver failure.
    Connection(ConnectionError),
    /// I/O errors while loading referenced resources.
    Io(std::io::Error),
}

#[derive(Debug)]
pub struct BuilderError {
    pub message: String,
    /// The resource being parsed when the error surfaced, if any.
    pub resource: Option<String>,
}

#[derive(Debug)]
pub struct IncompleteError {
    pub message: String,
}

#[derive(Debug)]
pub struct TypeAliasError {
    pub alias: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Bad connections exceeded the local tolerance.
    BadConnection,
    /// The checkout loop ended without a connection in hand.
    Exhausted,
    /// The pool was closed while waiting.
    Closed,
    /// The underlying driver failed to open a connection.
    Driver,
    /// The wrapper was invalidated (returned, reclaimed, or force-closed).
    Invalidated,
}

impl Error {
    pub fn builder(message: impl Into<String>) -> Self {
        Error::Builder(BuilderError {
            message: message.into(),
            resource: None,
        })
    }

    pub fn builder_in(message: impl Into<String>, resource: impl Into<String>) -> Self {
        Error::Builder(BuilderError {
            message: message.into(),
            resource: Some(resource.into()),
        })
    }

    pub fn incomplete(message: impl Into<String>) -> Self {
        Error::Incomplete(IncompleteError {
            message: message.into(),
        })
    }

    pub fn type_alias(alias: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TypeAlias(TypeAliasError {
            alias: alias.into(),
            message: message.into(),
        })
    }

    pub fn connection(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Error::Connection(ConnectionError {
            kind,
            message: message.into(),
        })
    }

    /// Whether this is a forward-reference failure the pending queues may
    /// absorb. Every other kind must escape.
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Error::Incomplete(_))
    }

    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Builder(e) => match &e.resource {
                Some(resource) => {
                    write!(f, "Builder error in '{}': {}", resource, e.message)
                }
                None => write!(f, "Builder error: {}", e.message),
            },
            Error::Incomplete(e) => write!(f, "Unresolved reference: {}", e.message),
            Error::Reflection(e) => write!(f, "Reflection error: {}", e),
            Error::TypeAlias(e) => write!(f, "Type alias error for '{}': {}", e.alias, e.message),
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Reflection(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for IncompleteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeAliasError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ReflectionError> for Error {
    fn from(err: ReflectionError) -> Self {
        Error::Reflection(err)
    }
}

impl From<BuilderError> for Error {
    fn from(err: BuilderError) -> Self {
        Error::Builder(err)
    }
}

impl From<IncompleteError> for Error {
    fn from(err: IncompleteError) -> Self {
        Error::Incomplete(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

/// Result type alias for sqlmapper operations.
pub type Result<T> = std::result::Result<T, Error>;
