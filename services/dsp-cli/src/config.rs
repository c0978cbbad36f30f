//! Connection configuration loading
//!
//! A connection file is a JSON document describing one Datasphere tenant:
//! the API and OAuth endpoints, client credentials, and where the refresh
//! credential is kept between runs. Path precedence: CLI `--config` arg >
//! `DSP_CONNECTION` env var > `connection.json` in the working directory.

use std::path::{Path, PathBuf};

use common::Secret;
use datasphere_auth::ClientConfig;
use serde::Deserialize;

/// One tenant's connection settings as stored on disk.
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    pub api_url: String,
    pub authorization_url: String,
    pub token_url: String,
    pub redirect_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub refresh_token_file: PathBuf,
}

impl ConnectionConfig {
    /// Load and validate a connection file.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ConnectionConfig = serde_json::from_str(&contents)?;

        for (field, value) in [
            ("api_url", &config.api_url),
            ("authorization_url", &config.authorization_url),
            ("token_url", &config.token_url),
            ("redirect_url", &config.redirect_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(common::Error::Config(format!(
                    "{field} must start with http:// or https://, got: {value}"
                )));
            }
        }

        if config.client_id.is_empty() {
            return Err(common::Error::Config("client_id must not be empty".into()));
        }

        Ok(config)
    }

    /// Resolve the connection file path from CLI arg or DSP_CONNECTION env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("DSP_CONNECTION") {
            return PathBuf::from(p);
        }
        PathBuf::from("connection.json")
    }

    /// Convert into the auth layer's validated client configuration.
    pub fn into_client_config(self) -> datasphere_auth::Result<ClientConfig> {
        ClientConfig::new(
            self.api_url,
            self.authorization_url,
            self.token_url,
            &self.redirect_url,
            self.client_id,
            self.client_secret,
            self.refresh_token_file,
        )
    }
}
