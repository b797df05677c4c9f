//! Error taxonomy for the request pipeline.

use thiserror::Error;

/// Errors surfaced by the session client and domain services.
///
/// The variants map directly onto how callers are expected to react:
/// re-login (`Unauthorized`), correct input (`Validation`), retry at their
/// own discretion (`Network`, `Server`), or report a bug (`Parse`).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials are expired or invalid and could not be refreshed.
    /// Unrecoverable without a new login.
    #[error("unauthorized")]
    Unauthorized,

    /// The backend rejected the request at the application level
    /// (`success: false` in the response envelope), typically with
    /// field-level errors the user can correct.
    #[error("{message}")]
    Validation {
        /// Human-readable message from the backend.
        message: String,
        /// Field-level error details, when provided.
        errors: Option<serde_json::Value>,
    },

    /// Transport-level failure (DNS, connect, timeout). Transient; retrying
    /// is the caller's decision, never the session client's.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a 5xx status.
    #[error("server error: HTTP {status}")]
    Server {
        /// HTTP status code.
        status: u16,
    },

    /// The response body was not a valid envelope or its `data` did not
    /// match the expected shape.
    #[error("response parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<marbelle_core::EmailError> for ApiError {
    fn from(error: marbelle_core::EmailError) -> Self {
        Self::Validation {
            message: error.to_string(),
            errors: None,
        }
    }
}

impl ApiError {
    /// Build a validation error from an envelope message.
    #[must_use]
    pub const fn validation(message: String, errors: Option<serde_json::Value>) -> Self {
        Self::Validation { message, errors }
    }

    /// True for errors that end the session.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}
