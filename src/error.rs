//! Error types for the Oracle tasks.

use std::io;
use thiserror::Error;

/// Result type alias for task operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for task operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Opening or authenticating the connection failed.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// The database reported a failure while executing a command.
    ///
    /// The message is the driver text, verbatim (e.g. `ORA-01722: invalid number`).
    #[error("{message}")]
    CommandExecution { message: String },

    /// A logical parameter type has no native equivalent.
    #[error("Can't convert '{type_name}' to an Oracle type")]
    TypeMapping { type_name: String },

    /// The requested output kind is not available on this path.
    #[error("Unsupported return type: {return_type}")]
    UnsupportedReturnType { return_type: String },

    /// The operation was aborted through its cancellation token.
    #[error("Operation was cancelled")]
    Cancelled,

    /// Malformed cursor handle or missing required parameter attributes.
    #[error("{message}")]
    Argument { message: String },

    /// Invalid task configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Rendering a result as XML, JSON or CSV failed.
    #[error("Encoding error: {message}")]
    Encoding { message: String },

    /// I/O error while writing output files or draining streams.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a command execution error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::CommandExecution {
            message: message.into(),
        }
    }

    /// Create an argument error.
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding(message: impl ToString) -> Self {
        Self::Encoding {
            message: message.to_string(),
        }
    }

    /// Create an unsupported return type error.
    pub fn unsupported_return_type(return_type: impl std::fmt::Display) -> Self {
        Self::UnsupportedReturnType {
            return_type: return_type.to_string(),
        }
    }
}

/// Text of a driver error as the database reported it.
///
/// Database errors carry their own `ORA-nnnnn: ...` message; the driver's
/// `Display` prefixes it with the failing layer, so that is used only for
/// errors raised by the driver itself.
pub(crate) fn driver_message(e: &oracle::Error) -> String {
    verbatim_message(e.db_error().map(|db| db.message()), e)
}

fn verbatim_message(db_message: Option<&str>, fallback: &dyn std::fmt::Display) -> String {
    match db_message {
        Some(message) => message.to_string(),
        None => fallback.to_string(),
    }
}

impl From<oracle::Error> for Error {
    fn from(e: oracle::Error) -> Self {
        Error::execution(driver_message(&e))
    }
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::encoding(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::encoding(e)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        if e.is_cancelled() {
            Error::Cancelled
        } else {
            Error::execution(format!("Task join error: {}", e))
        }
    }
}
