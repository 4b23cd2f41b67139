//! Error types for query composition.

use thiserror::Error;

/// Errors raised while composing identifiers, literals and templates.
///
/// These are programmer errors: they surface synchronously from the call
/// that caused them and are never retried.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An identifier was empty or otherwise unusable as a SQL name.
    #[error("invalid identifier {name:?}: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// An operand had the wrong kind for the requested composition.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A template placeholder had no value in the parameter mapping.
    #[error("missing parameter '{0}'")]
    MissingParameter(String),

    /// The template itself could not be scanned.
    #[error("malformed template at position {position}: {message}")]
    MalformedTemplate { position: usize, message: String },

    /// A relation map lookup did not match any field.
    #[error("unknown field '{field}'")]
    UnknownField { field: String },
}

impl CoreError {
    /// Create an invalid identifier error.
    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed template error at the given byte offset.
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::MalformedTemplate {
            position,
            message: message.into(),
        }
    }

    /// Create an unknown field error.
    pub fn unknown_field(field: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
        }
    }
}

/// Result type alias for composition operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::malformed(7, "unclosed placeholder");
        assert_eq!(
            err.to_string(),
            "malformed template at position 7: unclosed placeholder"
        );

        let err = CoreError::invalid_identifier("", "identifier cannot be empty");
        assert_eq!(
            err.to_string(),
            "invalid identifier \"\": identifier cannot be empty"
        );
    }
}
