//! Unified error types for the ledger.
//!
//! Every core operation returns [`Result`]. The variants map one-to-one onto the
//! failure kinds the routing layer needs to distinguish, see [`Error::kind`].

use thiserror::Error;

/// Errors produced by ledger operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced record does not exist (or was already reversed)
    #[error("{entity} '{key}' not found")]
    NotFound {
        /// Kind of record that was looked up
        entity: &'static str,
        /// Identifier used for the lookup
        key: String,
    },

    /// The code pool holds fewer codes than requested
    #[error("Insufficient stock: {available} available, {requested} requested")]
    InsufficientStock {
        /// Codes currently in the pool for the key
        available: u64,
        /// Codes the caller asked for
        requested: u64,
    },

    /// The account balance does not cover the debit
    #[error("Insufficient balance: {current:.2} available, {required:.2} required")]
    InsufficientBalance {
        /// Balance at the time of the check
        current: f64,
        /// Amount the operation needed
        required: f64,
    },

    /// The operation clashes with existing state
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable description
        message: String,
    },

    /// The actor is not allowed to perform the operation
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable description
        message: String,
    },

    /// Malformed or out-of-range input
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Human-readable description
        message: String,
    },

    /// Amount is not finite, not positive, or below a configured floor
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description
        message: String,
    },

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Coarse failure classification exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::InsufficientStock`]
    InsufficientStock,
    /// See [`Error::InsufficientBalance`]
    InsufficientBalance,
    /// See [`Error::Conflict`]
    Conflict,
    /// See [`Error::Forbidden`]
    Forbidden,
    /// Invalid input or amount
    InvalidInput,
    /// Storage, I/O or configuration failure
    Internal,
}

impl Error {
    /// Returns the failure kind of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidInput { .. } | Self::InvalidAmount { .. } => ErrorKind::InvalidInput,
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::EnvVar(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub(crate) fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub(crate) fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub(crate) fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
