//! Authenticated request facade
//!
//! Wraps API calls with the session token and a bounded self-healing
//! policy: the first authentication failure triggers exactly one
//! reauthentication and one retry of the identical request. A second
//! failure surfaces as an absent result — callers check for `None` —
//! which keeps permanently invalid credentials from looping forever.
//! Non-authentication failures are never retried here.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::session::{AccessToken, AuthSession};

/// A response surfaced to callers as-is: status plus raw body text.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> std::result::Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Outcome of one signed attempt. A 401 is a transition signal for the
/// retry-once policy, not an error; transport failures become `Err`.
enum Attempt {
    Response(ApiResponse),
    AuthRejected,
}

/// Public facade: authenticated requests against the configured API.
pub struct AuthenticatedClient {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    session: AuthSession,
}

impl AuthenticatedClient {
    /// Authenticate against the configured endpoints and return a client
    /// ready to issue requests.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let config = Arc::new(config);
        let http = reqwest::Client::new();
        let session = AuthSession::initialize(config.clone(), http.clone()).await?;
        Ok(Self {
            config,
            http,
            session,
        })
    }

    /// Issue a request for `path` relative to the configured API base URL.
    ///
    /// Returns `Ok(None)` only when the request was rejected for
    /// authentication twice — once before and once after a full
    /// reauthentication. Every other response, including non-auth error
    /// statuses, is returned as-is; transport failures propagate as
    /// `Error::Transport` without a retry.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Option<ApiResponse>> {
        let url = encode_request_url(&format!("{}{}", self.config.api_url, path));
        debug!(%method, %url, "issuing request");

        let token = self.session.access_token().await;
        match self.attempt(&method, &url, body.as_ref(), &token).await? {
            Attempt::Response(response) => Ok(Some(response)),
            Attempt::AuthRejected => {
                info!(%url, "request rejected for authentication, retrying once after reauthentication");
                self.session.reauthenticate(&token).await?;

                let token = self.session.access_token().await;
                match self.attempt(&method, &url, body.as_ref(), &token).await? {
                    Attempt::Response(response) => Ok(Some(response)),
                    Attempt::AuthRejected => {
                        warn!(%url, "request rejected again after reauthentication, giving up");
                        Ok(None)
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        method: &Method,
        url: &str,
        body: Option<&Value>,
        token: &AccessToken,
    ) -> Result<Attempt> {
        let mut request = self
            .http
            .request(method.clone(), url)
            .bearer_auth(token.secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(Attempt::AuthRejected);
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("reading response body failed: {e}")))?;
        Ok(Attempt::Response(ApiResponse { status, body }))
    }
}

/// Encode the characters Datasphere request paths legitimately carry that
/// are not valid in a URL: literal spaces (OData filter expressions) and
/// pipes (XSUAA identifiers). Everything else passes through unchanged.
fn encode_request_url(url: &str) -> String {
    url.replace(' ', "%20").replace('|', "%7C")
}
