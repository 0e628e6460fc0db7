//! Error types for the schema layer
//!
//! Every failure the schema layer can report is a [`StrataError`]. The
//! variants form a closed taxonomy so callers can branch on [`ErrorKind`]
//! instead of parsing messages.
//!
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for schema operations
pub type StrataResult<T> = std::result::Result<T, StrataError>;

/// Discriminant of a [`StrataError`], for matching without the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed type or slot construction input
    Configuration,
    /// A slot or cross-field validator rejected a value
    Validation,
    /// Unknown field or key, or a type operation applied to a foreign instance
    Lookup,
    /// Mutation attempted on a frozen instance
    Frozen,
    /// A user-supplied validator broke its own return contract
    ContractViolation,
    /// Unrecognized slot operation name
    UnsupportedOperation,
}

/// Error types for the schema layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrataError {
    /// Type, slot or configuration input is malformed
    #[error("configuration error: {message}")]
    Configuration {
        /// What was wrong with the input
        message: String,
    },

    /// Value rejected by a slot or by a type's cross-field validator
    ///
    /// The message is prefixed with the originating field or index when
    /// there is one, e.g. `low: must not be greater than high`.
    #[error("validation error: {message}")]
    Validation {
        /// Rejection message
        message: String,
    },

    /// Unknown field/key, or an instance of a different type
    #[error("lookup error: {message}")]
    Lookup {
        /// What could not be found
        message: String,
    },

    /// The target instance is frozen
    #[error("frozen: {message}")]
    Frozen {
        /// Which instance refused the mutation
        message: String,
    },

    /// A validator returned both an accepted value and an error message
    #[error("contract violation: {message}")]
    ContractViolation {
        /// Which contract was broken
        message: String,
    },

    /// Slot operation name not recognized
    #[error("unsupported operation: {operation}")]
    UnsupportedOperation {
        /// The rejected operation name
        operation: String,
    },
}

impl StrataError {
    /// Malformed construction input
    pub fn configuration(message: impl Into<String>) -> Self {
        StrataError::Configuration {
            message: message.into(),
        }
    }

    /// Rejection without a field or index context
    pub fn validation(message: impl Into<String>) -> Self {
        StrataError::Validation {
            message: message.into(),
        }
    }

    /// Rejection attributed to a field name or index label
    pub fn validation_at(context: impl AsRef<str>, reason: impl AsRef<str>) -> Self {
        StrataError::Validation {
            message: format!("{}: {}", context.as_ref(), reason.as_ref()),
        }
    }

    /// Unknown field, key, or foreign instance
    pub fn lookup(message: impl Into<String>) -> Self {
        StrataError::Lookup {
            message: message.into(),
        }
    }

    /// Mutation of a frozen instance
    pub fn frozen(message: impl Into<String>) -> Self {
        StrataError::Frozen {
            message: message.into(),
        }
    }

    /// Broken validator/formatter contract
    pub fn contract_violation(message: impl Into<String>) -> Self {
        StrataError::ContractViolation {
            message: message.into(),
        }
    }

    /// Unrecognized operation name
    pub fn unsupported(operation: impl Into<String>) -> Self {
        StrataError::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// Error discriminant
    pub fn kind(&self) -> ErrorKind {
        match self {
            StrataError::Configuration { .. } => ErrorKind::Configuration,
            StrataError::Validation { .. } => ErrorKind::Validation,
            StrataError::Lookup { .. } => ErrorKind::Lookup,
            StrataError::Frozen { .. } => ErrorKind::Frozen,
            StrataError::ContractViolation { .. } => ErrorKind::ContractViolation,
            StrataError::UnsupportedOperation { .. } => ErrorKind::UnsupportedOperation,
        }
    }

    /// The bare message, without the category prefix used by `Display`
    pub fn message(&self) -> &str {
        match self {
            StrataError::Configuration { message }
            | StrataError::Validation { message }
            | StrataError::Lookup { message }
            | StrataError::Frozen { message }
            | StrataError::ContractViolation { message } => message,
            StrataError::UnsupportedOperation { operation } => operation,
        }
    }

    /// Check for [`ErrorKind::Validation`]
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Check for [`ErrorKind::Frozen`]
    pub fn is_frozen(&self) -> bool {
        self.kind() == ErrorKind::Frozen
    }

    /// Check for [`ErrorKind::Lookup`]
    pub fn is_lookup(&self) -> bool {
        self.kind() == ErrorKind::Lookup
    }
}
