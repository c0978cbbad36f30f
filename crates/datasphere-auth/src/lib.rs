//! Three-legged OAuth2 client for the SAP Datasphere API
//!
//! Owns the authentication and transport layer beneath the API helpers.
//! This crate is a standalone library with no dependency on the CLI
//! binary — it can be tested and used independently.
//!
//! Authentication flow:
//! 1. `AuthSession::initialize` loads a persisted refresh credential via
//!    `TokenStore` and exchanges it silently at the token endpoint
//! 2. When no credential works, `CallbackListener` captures an
//!    authorization code delivered by a browser redirect
//! 3. `token::exchange_code` turns the code into tokens and the fresh
//!    refresh credential is persisted for the next run
//! 4. `AuthenticatedClient::request` signs API calls and, on an
//!    authentication failure, reauthenticates and retries exactly once

pub mod callback;
pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod store;
pub mod token;

pub use callback::{CallbackListener, await_authorization_code, build_authorization_url};
pub use client::{ApiResponse, AuthenticatedClient};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use session::{AccessToken, AuthSession};
pub use store::TokenStore;
pub use token::{TokenResponse, exchange_code, refresh_token};

pub use reqwest::{Method, StatusCode};
