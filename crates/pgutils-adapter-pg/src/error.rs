//! Error types for the Postgres adapter.

use pgutils_core::{ConfigError, CoreError};
use thiserror::Error;

/// SQLSTATE raised when a called function does not exist.
pub(crate) const UNDEFINED_FUNCTION: &str = "42883";

/// Errors that can occur while talking to Postgres.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The driver could not establish a session. `target` never includes
    /// the password.
    #[error("unable to connect to the database ({target}): {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// A server-side helper routine referenced by a query is not installed.
    #[error("function {function} is not available: {hint}")]
    FeatureUnavailable {
        function: &'static str,
        hint: &'static str,
    },

    /// Invalid connection settings.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Query composition failed before reaching the server.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The server rejected the statement or a value could not be decoded.
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),

    /// The result did not have the expected shape.
    #[error("unexpected result: {0}")]
    UnexpectedResult(String),
}

impl AdapterError {
    /// Whether this error carries the given SQLSTATE code.
    pub fn is_sqlstate(&self, code: &str) -> bool {
        match self {
            AdapterError::Query(sqlx::Error::Database(db)) => db.code().as_deref() == Some(code),
            _ => false,
        }
    }
}

/// Result type alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
