use thiserror::Error;
use validator::ValidationErrors;

/// Error taxonomy for the client core. Messages are stable and
/// user-legible; the UI layer presents them as-is.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error. Please check your internet connection.")]
    Network { message: String },
    #[error("Session expired. Please login again.")]
    SessionExpired,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Access denied.")]
    AccessDenied,
    #[error("{0}")]
    NotFound(String),
    #[error("Too many requests. Please try again later.")]
    RateLimited,
    #[error("Server error: {0}")]
    Server(String),
    #[error("Invalid response format")]
    InvalidResponseFormat,
    /// Application-level failure reported by the backend envelope.
    #[error("{0}")]
    Backend(String),
    #[error("Not authenticated")]
    AuthenticationRequired,
    #[error("Invalid email or password. Please try again.")]
    InvalidCredentials,
    #[error("Email not found. Please sign up first.")]
    EmailNotFound,
    #[error("Account not verified. Please check your email for verification link.")]
    AccountNotVerified,
    #[error("Purchase was cancelled")]
    PurchaseCancelled,
    #[error("You already own this subscription")]
    PurchaseAlreadyOwned,
    #[error("{0}")]
    PurchaseUnavailable(String),
    #[error("Validation error: {0}")]
    InvalidInput(#[from] ValidationErrors),
    #[error("Internal configuration error")]
    Configuration {
        message: String,
        #[source]
        source: figment::Error,
    },
}

impl AppError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// True for errors that must trigger the full session wipe.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, AppError::SessionExpired)
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Configuration {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}
