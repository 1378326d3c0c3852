//! Error types for leadline.

use thiserror::Error;

/// Result type alias using leadline's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for leadline operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Lead not found, or not visible to the requesting actor
    #[error("Lead not found: {0}")]
    LeadNotFound(uuid::Uuid),

    /// The backing store for a record type does not exist in this deployment
    #[error("Store not provisioned: {0}")]
    NotProvisioned(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error means "this store is absent", as opposed to a
    /// genuine query failure.
    pub fn is_not_provisioned(&self) -> bool {
        matches!(self, Error::NotProvisioned(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
