//! Error types for authentication and transport operations
//!
//! An HTTP 401 on an API request is deliberately not represented here: it
//! is a signal that drives the retry-once transition inside
//! `AuthenticatedClient`, and after the second occurrence the caller sees
//! an absent result rather than an error.

/// Errors from authentication and transport operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credential persistence failed: {0}")]
    Persistence(String),

    #[error("token exchange failed: {0}")]
    AuthExchange(String),

    #[error("authorization callback failed: {0}")]
    Callback(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
