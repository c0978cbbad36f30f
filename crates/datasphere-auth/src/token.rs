//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (initial interactive flow completion)
//! 2. Refresh-token exchange (silent renewal at startup and after a
//!    rejected request)
//!
//! Both operations POST to the configured token endpoint with different
//! grant types, carrying the client id and secret in the form body.

use serde::Deserialize;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// Expiry is deliberately not captured: validity is determined by the
/// server when a token is used, never tracked locally.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Code exchange always returns one; refresh exchange may rotate it
    /// or omit it entirely.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchange an authorization code for tokens (interactive flow completion).
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &ClientConfig,
    code: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::AuthExchange(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::AuthExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::AuthExchange(format!("invalid token response: {e}")))
}

/// Exchange a refresh token for a new access token.
///
/// Called at session startup (when a credential is persisted) and after a
/// request is rejected for authentication.
pub async fn refresh_token(
    client: &reqwest::Client,
    config: &ClientConfig,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(&config.token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::AuthExchange(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        // 401/403 means the refresh token is revoked or expired
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(Error::AuthExchange(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::AuthExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::AuthExchange(format!("invalid refresh response: {e}")))
}
