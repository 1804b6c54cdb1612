//! Unified error types for the referral engine.
//!
//! Expected failures (validation, lifecycle guards, missing records) are plain
//! variants so callers can match on them; infrastructure failures wrap the
//! underlying library error.

use thiserror::Error;

/// Every error the crate can produce.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage failure reported by `SeaORM`
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// A required field is missing or a value is out of range
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable reason shown to the operator
        message: String,
    },

    /// The referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record (e.g. `"Lead"`, `"Ambassador"`)
        entity: &'static str,
        /// Identifier the caller asked for
        id: String,
    },

    /// The lead's current status has no edge to the requested status
    #[error("Lead {lead_id}: invalid state ({from} -> {to})")]
    InvalidTransition {
        /// Lead being transitioned
        lead_id: i64,
        /// Status the lead is currently in
        from: String,
        /// Status that was requested
        to: String,
    },

    /// The lead already has a student record
    #[error("Lead {lead_id} has already been converted to a student")]
    AlreadyConverted {
        /// Lead that was converted earlier
        lead_id: i64,
    },

    /// Conversion requires a confirmed lead
    #[error("Lead {lead_id} is not confirmed")]
    NotConfirmed {
        /// Lead that is not yet confirmed
        lead_id: i64,
    },

    /// Discord gateway or HTTP failure
    #[error("Discord error: {0}")]
    Discord(Box<poise::serenity_prelude::Error>),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure while formatting a message
    #[error("Formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// Integer conversion overflow (limits, page sizes)
    #[error("Numeric conversion error: {0}")]
    NumericConversion(#[from] std::num::TryFromIntError),
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Discord(Box::new(value))
    }
}

impl Error {
    /// Shorthand for building a [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for building a [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether this error is an expected, operator-facing failure rather than
    /// an infrastructure fault.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. }
                | Self::NotFound { .. }
                | Self::InvalidTransition { .. }
                | Self::AlreadyConverted { .. }
                | Self::NotConfirmed { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
