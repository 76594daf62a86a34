//! Error types for elastorm

use thiserror::Error;

/// Errors surfaced to callers of the query and mutation API.
///
/// Transport failures never appear here with their own type: they are folded
/// into [`Error::Backend`] by [`crate::safety::guard`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Unsupported lookup '{lookup}' for field type '{field_type}'")]
    UnsupportedLookup { lookup: String, field_type: String },

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Invalid pagination bounds: low_mark={low}, high_mark={high}")]
    InvalidPagination { low: usize, high: usize },

    #[error("Invalid lookup value: {0}")]
    InvalidValue(String),

    #[error("Backend operation '{operation}' failed: {message}")]
    Backend { operation: String, message: String },
}

impl Error {
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsupported_lookup(lookup: impl Into<String>, field_type: impl ToString) -> Self {
        Self::UnsupportedLookup {
            lookup: lookup.into(),
            field_type: field_type.to_string(),
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
