//! Client configuration
//!
//! `ClientConfig` is built once at startup and never mutated. The redirect
//! URL is parsed at construction so the callback listener's port and path
//! are validated before any flow starts, not when the browser is already
//! waiting on a redirect.

use std::path::PathBuf;

use common::Secret;
use url::Url;

use crate::error::{Error, Result};

/// Immutable configuration for one Datasphere tenant.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL all API request paths are appended to (no trailing slash).
    pub api_url: String,
    /// Authorization endpoint the browser is sent to.
    pub authorization_url: String,
    /// Token endpoint for code exchange and refresh exchange.
    pub token_url: String,
    /// Port the callback listener binds, taken from the redirect URL.
    pub redirect_port: u16,
    /// Path the authorization server redirects to (leading slash).
    pub redirect_path: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    /// Where the refresh credential is persisted between runs.
    pub refresh_token_file: PathBuf,
}

impl ClientConfig {
    /// Build a validated configuration, extracting the callback listener's
    /// port and path from the redirect URL.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api_url: impl Into<String>,
        authorization_url: impl Into<String>,
        token_url: impl Into<String>,
        redirect_url: &str,
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        refresh_token_file: impl Into<PathBuf>,
    ) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(Error::Config("client_id must not be empty".into()));
        }

        let parsed = Url::parse(redirect_url)
            .map_err(|e| Error::Config(format!("invalid redirect_url {redirect_url}: {e}")))?;
        let redirect_port = parsed.port().ok_or_else(|| {
            Error::Config(format!(
                "redirect_url {redirect_url} must carry an explicit port"
            ))
        })?;
        let redirect_path = parsed.path().to_string();

        let api_url: String = api_url.into();
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            authorization_url: authorization_url.into(),
            token_url: token_url.into(),
            redirect_port,
            redirect_path,
            client_id,
            client_secret,
            refresh_token_file: refresh_token_file.into(),
        })
    }
}
